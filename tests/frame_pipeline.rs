use std::fs;
use std::path::Path;

use crane_scan::core::loaders::load_points_csv;
use crane_scan::{Pipeline, PipelineConfig};
use tempfile::TempDir;

fn write_frame(root: &Path, frame: u32, points: &[[f32; 3]], state: [f32; 3]) {
    let pc = root.join("Data").join("PC");
    let st = root.join("Data").join("State");
    fs::create_dir_all(&pc).unwrap();
    fs::create_dir_all(&st).unwrap();

    let rows: Vec<String> = points
        .iter()
        .map(|p| format!("{},{},{}", p[0], p[1], p[2]))
        .collect();
    fs::write(pc.join(format!("frame{}.csv", frame)), rows.join("\n")).unwrap();
    fs::write(
        st.join(format!("state{}.csv", frame)),
        format!("{},{},{}\n", state[0], state[1], state[2]),
    )
    .unwrap();
}

fn config(root: &Path) -> PipelineConfig {
    let yaml = format!(
        "
first_frame: 0
last_frame: 5
min_x: 0
max_x: 10
min_y: 0
max_y: 10
min_z: 0
max_z: 10
closeness: 0.5
trolley_threshold: 1.0
jib_threshold: 1.0
hook_threshold: 1.0
time_between_frames: 0.1
batch_size: 2
clustering: true
slicing: true
inspection: true
view_point: Front
export_csv: true
paths:
  points_dir: '{root}/Data/PC'
  state_dir: '{root}/Data/State'
  log_file: '{root}/Log.txt'
  output_dir: '{root}/out'
render:
  width: 320
  height: 240
",
        root = root.display()
    );
    PipelineConfig::from_yaml_str(&yaml).unwrap()
}

#[test]
fn test_full_run_over_frame_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    // frame 0: a near-duplicate pair
    write_frame(root, 0, &[[1.0, 1.0, 1.0], [1.2, 1.0, 1.0]], [0.0, 0.0, 0.0]);
    // frame 1: one point outside the cuboid
    write_frame(root, 1, &[[5.0, 5.0, 5.0], [12.0, 5.0, 5.0]], [0.0, 0.0, 0.0]);
    // frame 2 has no files
    // frame 3: trolley moves 0.2 in 0.1s, too fast
    write_frame(root, 3, &[[3.0, 3.0, 3.0]], [0.2, 0.0, 0.0]);
    // frame 4: hook creeps 0.05, allowed
    write_frame(root, 4, &[[4.0, 4.0, 4.0]], [0.2, 0.0, 0.05]);

    let mut pipeline = Pipeline::from_config(config(root)).unwrap();
    let reports = pipeline.run().unwrap();

    let ranges: Vec<_> = reports.iter().map(|r| r.frames.clone()).collect();
    assert_eq!(ranges, vec![0..2, 2..4, 4..5]);

    assert_eq!(reports[0].points_loaded, Some(4));
    assert_eq!(reports[0].after_dedupe, Some(3));
    assert_eq!(reports[0].after_slice, Some(2));
    assert_eq!(reports[1].stats.excluded, 1);
    assert_eq!(reports[1].stats.missing, 1);
    assert_eq!(reports[1].final_points(), Some(0));
    assert_eq!(reports[2].final_points(), Some(1));

    let stats = pipeline.session().stats();
    assert_eq!((stats.loaded, stats.excluded, stats.missing), (3, 1, 1));

    let out = root.join("out");
    for (start, end) in [(0, 2), (2, 4), (4, 5)] {
        assert!(out.join(format!("batch_{}_{}_Front.png", start, end)).is_file());
        assert!(out.join(format!("batch_{}_{}.csv", start, end)).is_file());
    }
    assert_eq!(
        load_points_csv(out.join("batch_0_2.csv")).unwrap().to_coords(),
        vec![[1.0, 1.0, 1.0], [5.0, 5.0, 5.0]]
    );

    drop(pipeline);
    let log = fs::read_to_string(root.join("Log.txt")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "Frame No.3 - Trolley Moved");
    assert_eq!(lines[1], "Trolley is too fast!");
    assert!(lines[2].starts_with("Speed: 2"));
    assert_eq!(lines[3], "Frame No.4 - Hook Moved");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_log_is_truncated_per_run() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_frame(root, 0, &[[1.0, 1.0, 1.0]], [0.0, 0.0, 0.0]);
    write_frame(root, 1, &[[1.0, 1.0, 1.0]], [0.0, 0.5, 0.0]);
    fs::write(root.join("Log.txt"), "stale entry\n").unwrap();

    let mut config = config(root);
    config.inspection = false;
    config.export_csv = false;

    for _ in 0..2 {
        let mut pipeline = Pipeline::from_config(config.clone()).unwrap();
        pipeline.run().unwrap();
    }

    let log = fs::read_to_string(root.join("Log.txt")).unwrap();
    assert_eq!(log, "Frame No.1 - Jib Moved\nJib is too fast!\nSpeed: 5\n");
}
