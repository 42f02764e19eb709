//! Integration tests for voxcrate-dataset
//!
//! These tests build a small dataset directory on disk and run the whole
//! preprocessing path: manifest → point files → voxelizer → grid store →
//! batches → classifier → metrics.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{tempdir, TempDir};
use voxcrate_algorithms::{OriginPolicy, RotationAugmentation, ScalePolicy, Voxelizer, VoxelizerConfig};
use voxcrate_core::{ErrorKind, LabelDictionary, OccupancyPolicy, Result, SampleRecord, VoxelGrid};
use voxcrate_dataset::*;
use voxcrate_io::{BinPointReader, GridStore};

/// Write `(x, y, z, intensity)` records in the default little-endian layout
fn write_points(path: &Path, points: &[[f32; 3]]) {
    let mut file = File::create(path).unwrap();
    for p in points {
        for &v in p {
            file.write_f32::<LittleEndian>(v).unwrap();
        }
        file.write_f32::<LittleEndian>(1.0).unwrap();
    }
    file.flush().unwrap();
}

/// A box-shaped object of roughly car size
fn car_points() -> Vec<[f32; 3]> {
    let mut points = Vec::new();
    for i in 0..10 {
        for j in 0..5 {
            points.push([i as f32 * 0.4 - 2.0, j as f32 * 0.35 - 0.8, (i + j) as f32 * 0.1]);
        }
    }
    points
}

/// A tall thin object
fn tree_points() -> Vec<[f32; 3]> {
    (0..40).map(|k| [0.1 * (k % 3) as f32, 0.05 * (k % 4) as f32, k as f32 * 0.12]).collect()
}

/// Dataset with two good files, one unknown category, one malformed and one
/// empty file, all listed in fold 0
fn create_test_dataset() -> TempDir {
    let dir = tempdir().unwrap();
    let objects = dir.path().join("objects");
    let folds = dir.path().join("folds");
    fs::create_dir_all(&objects).unwrap();
    fs::create_dir_all(&folds).unwrap();

    write_points(&objects.join("car.1.10.bin"), &car_points());
    write_points(&objects.join("tree.2.5.bin"), &tree_points());
    write_points(&objects.join("bicycle.0.1.bin"), &car_points());
    write_points(&objects.join("van.0.0.bin"), &[]);

    let mut malformed = File::create(objects.join("pole.3.3.bin")).unwrap();
    for v in 0..7 {
        malformed.write_f32::<LittleEndian>(v as f32).unwrap();
    }

    fs::write(
        folds.join("fold0.txt"),
        "car.1.10.bin\n\nbicycle.0.1.bin\npole.3.3.bin  \nvan.0.0.bin\ntree.2.5.bin\n",
    )
    .unwrap();
    fs::write(folds.join("fold1.txt"), "car.1.10.bin\nmissing.9.9.bin\n").unwrap();
    dir
}

fn builder<'a>(labels: &'a LabelDictionary, config: BuildConfig) -> DatasetBuilder<'a, BinPointReader> {
    let voxelizer = Voxelizer::new(VoxelizerConfig::default()).unwrap();
    DatasetBuilder::new(BinPointReader::default(), voxelizer, labels, config).unwrap()
}

fn config(dataset: &TempDir, output: &Path) -> BuildConfig {
    BuildConfig::default()
        .with_dataset_dir(dataset.path())
        .with_output_dir(output)
        .with_parallel(ParallelConfig::sequential())
}

#[test]
fn test_build_writes_grids_and_reports_skips() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    let report = builder(&labels, config(&dataset, output.path())).run().unwrap();

    let written: Vec<&str> = report.written.iter().map(|r| r.source_name.as_str()).collect();
    assert_eq!(written, vec!["car.1.10.bin", "tree.2.5.bin"]);
    assert_eq!(report.written[0].label.id, 3);
    assert_eq!(report.written[1].label.id, 9);

    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.skipped_with(ErrorKind::UnknownLabel), 1);
    assert_eq!(report.skipped_with(ErrorKind::MalformedInput), 1);
    assert_eq!(report.skipped_with(ErrorKind::EmptyResult), 1);
    let empty = report.skipped.iter().find(|s| s.reason == ErrorKind::EmptyResult).unwrap();
    assert_eq!(empty.source_name, "van.0.0.bin");
    assert_eq!(empty.sample_index, 0);

    let training = output.path().join("training");
    assert!(training.join("car.1.10_0.npy").exists());
    assert!(training.join("tree.2.5_0.npy").exists());
    assert!(!training.join("van.0.0_0.npy").exists());

    let index = GridStore::open(&training).read_index().unwrap().unwrap();
    assert_eq!(index.resolution, 32);
    assert_eq!(index.occupancy, OccupancyPolicy::Binary);
    assert_eq!(index.samples, report.written);
}

#[test]
fn test_parallel_matches_sequential() {
    let dataset = create_test_dataset();
    let labels = LabelDictionary::sydney_urban_objects();

    let sequential_out = tempdir().unwrap();
    let sequential = builder(&labels, config(&dataset, sequential_out.path())).run().unwrap();

    let parallel_out = tempdir().unwrap();
    let parallel_config = config(&dataset, parallel_out.path())
        .with_parallel(ParallelConfig::default().with_threads(3));
    let parallel = builder(&labels, parallel_config).run().unwrap();

    assert_eq!(sequential, parallel);
    for record in &sequential.written {
        let name = record.storage_file_name();
        let a = fs::read(sequential_out.path().join("training").join(&name)).unwrap();
        let b = fs::read(parallel_out.path().join("training").join(&name)).unwrap();
        assert_eq!(a, b, "{} differs", name);
    }
}

#[test]
fn test_abort_policy_stops_on_malformed_file() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    let config = config(&dataset, output.path()).with_malformed_policy(FailurePolicy::Abort);
    let err = builder(&labels, config).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn test_missing_point_file_is_fatal() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    // Unknown categories are skipped before their file is opened
    let report = builder(&labels, config(&dataset, output.path()).with_fold(1)).run().unwrap();
    assert_eq!(report.skipped_with(ErrorKind::UnknownLabel), 1);

    fs::write(dataset.path().join("folds").join("fold2.txt"), "pedestrian.0.42.bin\n").unwrap();
    let err = builder(&labels, config(&dataset, output.path()).with_fold(2)).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_missing_manifest_is_fatal() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    let err = builder(&labels, config(&dataset, output.path()).with_fold(7)).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_clear_output_removes_stale_grids() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let stale = output.path().join("testing").join("old.0.0_0.npy");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "stale").unwrap();

    let labels = LabelDictionary::sydney_urban_objects();
    let kept = config(&dataset, output.path()).with_split(Split::Testing);
    builder(&labels, kept.clone()).run().unwrap();
    assert!(stale.exists());

    builder(&labels, kept.with_clear_output(true)).run().unwrap();
    assert!(!stale.exists());
    assert!(output.path().join("testing").join("car.1.10_0.npy").exists());
}

#[test]
fn test_folds_accumulate_in_one_split() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    write_points(&dataset.path().join("objects").join("truck.4.2.bin"), &car_points());
    fs::write(dataset.path().join("folds").join("fold3.txt"), "truck.4.2.bin\ncar.1.10.bin\n").unwrap();

    builder(&labels, config(&dataset, output.path())).run().unwrap();
    let second = builder(&labels, config(&dataset, output.path()).with_fold(3));
    let report = second.run().unwrap();
    assert_eq!(report.written.len(), 2);

    let index = second.store().read_index().unwrap().unwrap();
    let indexed: Vec<&str> = index.samples.iter().map(|r| r.source_name.as_str()).collect();
    assert_eq!(indexed, vec!["car.1.10.bin", "tree.2.5.bin", "truck.4.2.bin"]);

    let generator = BatchGenerator::from_store(second.store(), &labels, 2).unwrap();
    assert_eq!(generator.len(), 3);
    assert_eq!(generator.num_batches(), 2);
}

#[test]
fn test_mismatched_grid_settings_rejected() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    builder(&labels, config(&dataset, output.path())).run().unwrap();

    let coarse = Voxelizer::new(VoxelizerConfig::default().with_resolution(16)).unwrap();
    let err = DatasetBuilder::new(
        BinPointReader::default(),
        coarse,
        &labels,
        config(&dataset, output.path()).with_fold(1),
    )
    .unwrap()
    .run()
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);

    // Clearing the output starts a fresh index
    let coarse = Voxelizer::new(VoxelizerConfig::default().with_resolution(16)).unwrap();
    let config = config(&dataset, output.path()).with_fold(1).with_clear_output(true);
    DatasetBuilder::new(BinPointReader::default(), coarse, &labels, config)
        .unwrap()
        .run()
        .unwrap();
    let index = GridStore::for_split(output.path(), "training").read_index().unwrap().unwrap();
    assert_eq!(index.resolution, 16);
    assert_eq!(index.samples.len(), 1);
}

#[test]
fn test_rotation_augmentation_writes_every_sample() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    let config = config(&dataset, output.path()).with_augmentation(RotationAugmentation::new(4).unwrap());
    let report = builder(&labels, config).run().unwrap();

    assert_eq!(report.written.len(), 8);
    for index in 0..4 {
        assert!(output.path().join("training").join(format!("car.1.10_{}.npy", index)).exists());
    }
    // Entry-level failures are reported once per sample index
    assert_eq!(report.skipped_with(ErrorKind::UnknownLabel), 4);
    assert_eq!(report.skipped_with(ErrorKind::EmptyResult), 4);
}

#[test]
fn test_occupancy_scenario_through_the_store() {
    let dataset = tempdir().unwrap();
    fs::create_dir_all(dataset.path().join("objects")).unwrap();
    fs::create_dir_all(dataset.path().join("folds")).unwrap();
    write_points(
        &dataset.path().join("objects").join("car.0.0.bin"),
        &[[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [31.0, 31.0, 31.0]],
    );
    fs::write(dataset.path().join("folds").join("fold0.txt"), "car.0.0.bin\n").unwrap();

    let labels = LabelDictionary::sydney_urban_objects();
    for (occupancy, expected_origin_cell) in [(OccupancyPolicy::Binary, 1), (OccupancyPolicy::Count, 2)] {
        let output = tempdir().unwrap();
        let voxelizer = Voxelizer::new(
            VoxelizerConfig::default()
                .with_scale(ScalePolicy::Fixed {
                    cell_size: 1.0,
                    origin: OriginPolicy::Explicit(voxcrate_core::Point3f::origin()),
                })
                .with_occupancy(occupancy),
        )
        .unwrap();
        let builder = DatasetBuilder::new(
            BinPointReader::default(),
            voxelizer,
            &labels,
            config(&dataset, output.path()),
        )
        .unwrap();
        builder.run().unwrap();

        let store = builder.store();
        let grid = store.load(&store.dir().join("car.0.0_0.npy"), occupancy).unwrap();
        assert_eq!(grid.occupied_count(), 3);
        assert_eq!(grid.get([0, 0, 0]), Some(expected_origin_cell));
        assert_eq!(grid.get([31, 31, 31]), Some(1));
    }
}

#[test]
fn test_visualizer_sees_every_written_grid() {
    struct Counting<'a>(&'a AtomicUsize);
    impl Visualizer for Counting<'_> {
        fn show(&self, _record: &SampleRecord, grid: &VoxelGrid) -> Result<()> {
            assert!(!grid.is_all_zero());
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();
    let shown = AtomicUsize::new(0);

    let config = config(&dataset, output.path()).with_visualize(true);
    builder(&labels, config).with_visualizer(Counting(&shown)).run().unwrap();
    assert_eq!(shown.load(Ordering::SeqCst), 2);
}

#[test]
fn test_batches_and_evaluation_after_build() {
    let dataset = create_test_dataset();
    let output = tempdir().unwrap();
    let labels = LabelDictionary::sydney_urban_objects();

    let config = config(&dataset, output.path()).with_augmentation(RotationAugmentation::new(3).unwrap());
    let builder = builder(&labels, config);
    builder.run().unwrap();

    let generator = BatchGenerator::from_store(builder.store(), &labels, 4).unwrap();
    assert_eq!(generator.len(), 6);
    assert_eq!(generator.resolution(), 32);

    let truth: Vec<u32> = generator.records().map(|r| r.label.id).collect();
    let classifier = PriorClassifier::fit(&truth, labels.len()).unwrap();
    let results = predict_all(&classifier, generator.epoch_in_order()).unwrap();
    assert_eq!(results.len(), 6);

    let predicted: Vec<u32> = results.iter().map(|(_, p)| p.class).collect();
    let actual: Vec<u32> = results.iter().map(|(r, _)| r.label.id).collect();
    let evaluation = evaluate(&predicted, &actual, labels.len()).unwrap();
    assert_eq!(evaluation.accuracy, 0.5);

    let line = report_line(&results[0].1, results[0].0.label.id, &labels).unwrap();
    assert!(line.starts_with("predicted class: 3-car, ground truth: "));
}
