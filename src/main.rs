fn main() {
    crane_scan::cli::run();
}
