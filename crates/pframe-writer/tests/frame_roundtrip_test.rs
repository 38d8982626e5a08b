// Integration tests for writing frames and reading them back
//
// Each test runs real workflows against a temporary frame folder and
// inspects the resulting directory, metadata files and reconstructed tables.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, AsArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use pframe_writer::{
    AxisSpec, AxisType, ColumnSpec, ColumnType, DataInfo, ErrorCode, FrameError, GlobalSettings,
    LocalParquetBackend, ReadFrame, Step, Table, Workflow, WriteFrame,
};

struct Fixture {
    _root: tempfile::TempDir,
    frames: PathBuf,
    spill: PathBuf,
    settings: GlobalSettings,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let frames = root.path().join("frames");
        let spill = root.path().join("spill");
        let settings = GlobalSettings::default()
            .with_root_folder(root.path())
            .with_frame_folder(&frames)
            .with_spill_folder(&spill);
        Self {
            _root: root,
            frames,
            spill,
            settings,
        }
    }

    fn without_spill(self) -> Self {
        let mut fixture = self;
        fixture.settings.spill_folder = None;
        fixture
    }

    fn frame_dir(&self, name: &str) -> PathBuf {
        self.frames.join(name)
    }

    fn write(&self, table: Table, step: WriteFrame) -> Result<HashMap<String, Table>, FrameError> {
        let mut tables = HashMap::new();
        tables.insert(step.input_table.clone(), table);
        Workflow::new(vec![Step::WriteFrame(step)]).execute(
            self.settings.clone(),
            tables,
            &LocalParquetBackend::new(),
        )
    }

    fn read(&self, frame_name: &str, columns: &[&str]) -> Result<RecordBatch, FrameError> {
        let step = ReadFrame {
            name: "out".to_string(),
            frame_name: frame_name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        };
        let tables = Workflow::new(vec![Step::ReadFrame(step)]).execute(
            self.settings.clone(),
            HashMap::new(),
            &LocalParquetBackend::new(),
        )?;
        Ok(tables["out"].concat().unwrap())
    }

    fn datainfo(&self, frame_name: &str, column: &str) -> DataInfo {
        let bytes = fs::read(self.frame_dir(frame_name).join(format!("{}.datainfo", column))).unwrap();
        DataInfo::from_json_slice(&bytes).unwrap()
    }
}

fn write_frame(
    frame_name: &str,
    axes: Vec<AxisSpec>,
    columns: Vec<ColumnSpec>,
    partition_key_length: usize,
) -> WriteFrame {
    WriteFrame {
        input_table: "input".to_string(),
        frame_name: frame_name.to_string(),
        axes,
        columns,
        partition_key_length,
        strict: false,
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// id, category, value with one null category
fn mixed_table() -> Table {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(StringArray::from(vec![
                Some("A"),
                Some("B"),
                None,
                Some("C"),
                Some("B"),
            ])),
            Arc::new(Float64Array::from(vec![
                Some(10.5),
                Some(20.0),
                Some(15.5),
                Some(25.0),
                None,
            ])),
        ],
    )
    .unwrap();
    Table::from_batch(batch)
}

fn mixed_axes() -> Vec<AxisSpec> {
    vec![
        AxisSpec::new("id", AxisType::Long),
        AxisSpec::new("category", AxisType::String),
    ]
}

fn value_column() -> Vec<ColumnSpec> {
    vec![ColumnSpec::new("value", ColumnType::Double)]
}

/// group, id, value, extra; rows deliberately out of order
fn grouped_table(reversed: bool) -> Table {
    let mut rows = vec![
        ("x'y", 3i64, 1.0f64, 7i64),
        ("plain", 1, 2.0, 7),
        ("x'y", 1, 3.0, 7),
        ("plain", 2, 4.0, 7),
        ("z", 9, 5.0, 7),
    ];
    if reversed {
        rows.reverse();
    }
    let schema = Arc::new(Schema::new(vec![
        Field::new("group", DataType::Utf8, true),
        Field::new("id", DataType::Int64, true),
        Field::new("value", DataType::Float64, true),
        Field::new("extra", DataType::Int64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(rows.iter().map(|r| r.0).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())),
        ],
    )
    .unwrap();
    Table::from_batch(batch)
}

fn grouped_axes() -> Vec<AxisSpec> {
    vec![
        AxisSpec::new("group", AxisType::String),
        AxisSpec::new("id", AxisType::Long),
    ]
}

#[test]
fn test_roundtrip_drops_null_axis_rows() {
    let fixture = Fixture::new();
    fixture
        .write(mixed_table(), write_frame("mixed", mixed_axes(), value_column(), 0))
        .unwrap();

    let batch = fixture.read("mixed", &["value"]).unwrap();
    assert_eq!(batch.num_columns(), 3);
    assert_eq!(
        batch.column(0).as_primitive::<Int64Type>().values().to_vec(),
        vec![1, 2, 4, 5]
    );
    let categories: Vec<&str> = batch.column(1).as_string::<i32>().iter().flatten().collect();
    assert_eq!(categories, vec!["A", "B", "C", "B"]);

    let values = batch.column(2).as_primitive::<Float64Type>();
    assert_eq!(values.value(0), 10.5);
    assert_eq!(values.value(2), 25.0);
    assert!(values.is_null(3));
}

#[test]
fn test_roundtrip_with_partitioning_restores_key_axis() {
    let fixture = Fixture::new();
    let mut columns = value_column();
    columns.push(ColumnSpec::new("extra", ColumnType::Long));
    fixture
        .write(grouped_table(false), write_frame("grouped", grouped_axes(), columns, 1))
        .unwrap();

    let batch = fixture.read("grouped", &["value", "extra"]).unwrap();
    assert_eq!(batch.num_rows(), 5);
    assert_eq!(batch.schema().field(0).name(), "group");
    assert_eq!(batch.schema().field(3).name(), "extra");

    let groups: Vec<&str> = batch.column(0).as_string::<i32>().iter().flatten().collect();
    assert_eq!(groups, vec!["plain", "plain", "x'y", "x'y", "z"]);
    assert_eq!(
        batch.column(1).as_primitive::<Int64Type>().values().to_vec(),
        vec![1, 2, 1, 3, 9]
    );
    assert_eq!(
        batch.column(2).as_primitive::<Float64Type>().values().to_vec(),
        vec![2.0, 4.0, 3.0, 1.0, 5.0]
    );
}

#[test]
fn test_example_two_partitions() {
    let fixture = Fixture::new();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("seq", DataType::Int64, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 2])),
            Arc::new(Int64Array::from(vec![0, 1, 0])),
            Arc::new(Float64Array::from(vec![10.5, 20.0, 30.5])),
        ],
    )
    .unwrap();
    let axes = vec![
        AxisSpec::new("id", AxisType::Long),
        AxisSpec::new("seq", AxisType::Long),
    ];
    fixture
        .write(Table::from_batch(batch), write_frame("example", axes, value_column(), 1))
        .unwrap();

    let info = fixture.datainfo("example", "value");
    assert_eq!(info.partition_key_length, 1);
    let keys: Vec<&str> = info.parts.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["[1]", "[2]"]);

    let first = &info.parts["[1]"];
    let second = &info.parts["[2]"];
    assert_eq!(first.data, "partition_0.parquet");
    assert_eq!(second.data, "partition_1.parquet");
    assert_eq!(first.stats.number_of_rows, 2);
    assert_eq!(second.stats.number_of_rows, 1);
    assert_eq!(first.axes, vec![AxisSpec::new("seq", AxisType::Long)]);
    assert_eq!(first.stats.number_of_bytes.axes.len(), 1);
    assert_ne!(first.data_digest, second.data_digest);

    assert_eq!(
        files_in(&fixture.frame_dir("example")),
        vec![
            "partition_0.parquet",
            "partition_1.parquet",
            "value.datainfo",
            "value.spec"
        ]
    );
}

#[test]
fn test_digests_are_deterministic() {
    let fixture = Fixture::new();
    fixture
        .write(grouped_table(false), write_frame("first", grouped_axes(), value_column(), 1))
        .unwrap();
    fixture
        .write(grouped_table(true), write_frame("second", grouped_axes(), value_column(), 1))
        .unwrap();

    let first = fixture.datainfo("first", "value");
    let second = fixture.datainfo("second", "value");
    assert_eq!(first.parts.len(), 3);
    for (key, part) in &first.parts {
        assert_eq!(part.data_digest, second.parts[key].data_digest, "part {key}");
        assert_eq!(part.stats, second.parts[key].stats, "part {key}");
    }
}

#[test]
fn test_partitions_are_disjoint_and_complete() {
    let fixture = Fixture::new();
    fixture
        .write(grouped_table(false), write_frame("disjoint", grouped_axes(), value_column(), 1))
        .unwrap();

    let info = fixture.datainfo("disjoint", "value");
    let total: u64 = info.parts.values().map(|p| p.stats.number_of_rows).sum();
    assert_eq!(total, 5);

    let mut files: Vec<&str> = info.parts.values().map(|p| p.data.as_str()).collect();
    files.sort();
    files.dedup();
    assert_eq!(files.len(), info.parts.len());
    assert_eq!(
        info.parts.keys().cloned().collect::<Vec<_>>(),
        vec![r#"["plain"]"#, r#"["x'y"]"#, r#"["z"]"#]
    );
}

#[test]
fn test_empty_table_produces_empty_parts() {
    let fixture = Fixture::new();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]));
    fixture
        .write(
            Table::empty(schema),
            write_frame("empty", mixed_axes(), value_column(), 0),
        )
        .unwrap();

    let info = fixture.datainfo("empty", "value");
    assert_eq!(info.partition_key_length, 0);
    assert!(info.parts.is_empty());
    assert_eq!(
        files_in(&fixture.frame_dir("empty")),
        vec!["value.datainfo", "value.spec"]
    );

    let batch = fixture.read("empty", &["value"]).unwrap();
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.num_columns(), 3);
}

#[test]
fn test_strict_mode_fails_before_metadata() {
    let fixture = Fixture::new();
    let mut step = write_frame("strict", mixed_axes(), value_column(), 0);
    step.strict = true;

    let err = fixture.write(mixed_table(), step).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E002DataIntegrity);
    assert!(err.to_string().contains("'category'"));
    assert!(err.to_string().contains("1 null value"));

    let files = files_in(&fixture.frame_dir("strict"));
    assert!(files.iter().all(|f| !f.ends_with(".datainfo")), "{files:?}");
    assert!(files_in(&fixture.spill).is_empty());
}

#[test]
fn test_strict_mode_accepts_complete_axes() {
    let fixture = Fixture::new();
    let mut step = write_frame("strict_ok", grouped_axes(), value_column(), 0);
    step.strict = true;
    fixture.write(grouped_table(false), step).unwrap();
    assert_eq!(fixture.datainfo("strict_ok", "value").parts.len(), 1);
}

#[test]
fn test_identifier_collision_rejected() {
    let fixture = Fixture::new();
    let step = write_frame(
        "collision",
        vec![AxisSpec::new("x", AxisType::Long)],
        vec![ColumnSpec::new("x", ColumnType::Double)],
        0,
    );
    let err = fixture.write(mixed_table(), step).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E001InvalidRequest);
    assert!(err.to_string().contains("\"x\""));
    assert!(!fixture.frame_dir("collision").exists());
}

#[test]
fn test_partition_key_length_boundary() {
    let fixture = Fixture::new();
    let err = fixture
        .write(mixed_table(), write_frame("full", mixed_axes(), value_column(), 2))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E001InvalidRequest);
    assert!(!fixture.frame_dir("full").exists());

    fixture
        .write(mixed_table(), write_frame("leading", mixed_axes(), value_column(), 1))
        .unwrap();
    assert_eq!(fixture.datainfo("leading", "value").parts.len(), 4);
}

#[test]
fn test_repeated_axis_tuples_rejected() {
    let fixture = Fixture::new();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 2])),
            Arc::new(StringArray::from(vec!["a", "a", "b"])),
            Arc::new(Float64Array::from(vec![10.5, 20.0, 30.5])),
        ],
    )
    .unwrap();

    let err = fixture
        .write(
            Table::from_batch(batch),
            write_frame("repeated", mixed_axes(), value_column(), 0),
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E002DataIntegrity);
    assert!(err.to_string().contains(r#"[1,"a"]"#), "{err}");
    assert!(!fixture.frame_dir("repeated").exists());
}

#[test]
fn test_column_ids_cannot_escape_frame_dir() {
    let fixture = Fixture::new();
    let step = write_frame(
        "escape",
        mixed_axes(),
        vec![ColumnSpec::new("../escaped", ColumnType::Double)],
        0,
    );
    let err = fixture.write(mixed_table(), step).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E001InvalidRequest);
    assert!(files_in(&fixture.frames).is_empty());

    fixture
        .write(mixed_table(), write_frame("inside", mixed_axes(), value_column(), 0))
        .unwrap();
    let err = fixture.read("inside", &["../inside/value"]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E001InvalidRequest);
}

#[test]
fn test_failed_workflow_releases_frame_dir() {
    let fixture = Fixture::new();
    let mut tables = HashMap::new();
    tables.insert("input".to_string(), mixed_table());
    let workflow = Workflow::new(vec![
        Step::WriteFrame(write_frame("retry", mixed_axes(), value_column(), 0)),
        Step::ReadFrame(ReadFrame {
            name: "out".to_string(),
            frame_name: "absent".to_string(),
            columns: vec!["value".to_string()],
        }),
    ]);
    let err = workflow
        .execute(fixture.settings.clone(), tables, &LocalParquetBackend::new())
        .unwrap_err();
    assert!(err.to_string().contains("is not an existing directory"));
    assert!(!fixture.frame_dir("retry").exists());

    fixture
        .write(mixed_table(), write_frame("retry", mixed_axes(), value_column(), 0))
        .unwrap();
    assert_eq!(fixture.datainfo("retry", "value").parts.len(), 1);
}

#[test]
fn test_existing_frame_is_not_overwritten() {
    let fixture = Fixture::new();
    fixture
        .write(mixed_table(), write_frame("once", mixed_axes(), value_column(), 0))
        .unwrap();
    let before = fs::read(fixture.frame_dir("once").join("value.datainfo")).unwrap();

    let err = fixture
        .write(grouped_table(false), write_frame("once", grouped_axes(), value_column(), 0))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E003FrameExists);
    let after = fs::read(fixture.frame_dir("once").join("value.datainfo")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_frame_name_must_be_plain() {
    let fixture = Fixture::new();
    for name in ["", "../escape", "nested/frame"] {
        let err = fixture
            .write(mixed_table(), write_frame(name, mixed_axes(), value_column(), 0))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::E001InvalidRequest, "{name}");
    }
    assert!(files_in(&fixture.frames).is_empty());
}

#[test]
fn test_intermediate_file_removed_after_write() {
    let fixture = Fixture::new();
    fixture
        .write(mixed_table(), write_frame("spilled", mixed_axes(), value_column(), 0))
        .unwrap();
    assert!(files_in(&fixture.spill).is_empty());

    let fixture = Fixture::new().without_spill();
    fixture
        .write(mixed_table(), write_frame("local", mixed_axes(), value_column(), 0))
        .unwrap();
    let files = files_in(&fixture.frame_dir("local"));
    assert!(!files.iter().any(|f| f.starts_with("_intermediate")), "{files:?}");
    assert!(files.contains(&"partition_0.parquet".to_string()));
}

#[test]
fn test_column_cast_is_lenient_axis_cast_is_strict() {
    let fixture = Fixture::new();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("value", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["1", "2"])),
            Arc::new(StringArray::from(vec!["a", "b"])),
            Arc::new(StringArray::from(vec!["1.5", "not a number"])),
        ],
    )
    .unwrap();
    fixture
        .write(
            Table::from_batch(batch),
            write_frame("lenient", mixed_axes(), value_column(), 0),
        )
        .unwrap();
    let read = fixture.read("lenient", &["value"]).unwrap();
    let values = read.column(2).as_primitive::<Float64Type>();
    assert_eq!(values.value(0), 1.5);
    assert!(values.is_null(1));

    let bad_axis = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["1", "two"])),
            Arc::new(StringArray::from(vec!["a", "b"])),
            Arc::new(StringArray::from(vec!["1.5", "2.5"])),
        ],
    )
    .unwrap();
    let err = fixture
        .write(
            Table::from_batch(bad_axis),
            write_frame("strict_cast", mixed_axes(), value_column(), 0),
        )
        .unwrap_err();
    assert!(err.to_string().contains("'id'"));
    assert!(!fixture.frame_dir("strict_cast").exists());
}

#[test]
fn test_read_missing_frame() {
    let fixture = Fixture::new();
    fs::create_dir_all(&fixture.frames).unwrap();
    let err = fixture.read("absent", &["value"]).unwrap_err();
    assert!(err.to_string().contains("is not an existing directory"));
}

#[test]
fn test_frame_steps_require_frame_folder() {
    let mut fixture = Fixture::new();
    fixture.settings.frame_folder = None;

    let err = fixture.read("any", &["value"]).unwrap_err();
    assert!(err.to_string().contains("Frame folder is not set"));

    let err = fixture
        .write(mixed_table(), write_frame("any", mixed_axes(), value_column(), 0))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E006Workflow);
}

#[test]
fn test_read_unknown_column_is_io_error() {
    let fixture = Fixture::new();
    fixture
        .write(mixed_table(), write_frame("known", mixed_axes(), value_column(), 0))
        .unwrap();
    let err = fixture.read("known", &["nope"]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E004Io);
}

#[test]
fn test_write_then_read_in_one_workflow() {
    let fixture = Fixture::new();
    fs::write(
        fixture.settings.root_folder.join("input.csv"),
        "id,category,value\n2,b,2.5\n1,a,1.5\n",
    )
    .unwrap();

    let workflow = Workflow::from_json_str(
        r#"{"workflow": [
            {"type": "read_csv", "file": "input.csv", "name": "input"},
            {"type": "write_frame", "input_table": "input", "frame_name": "csv_frame",
             "axes": [{"id": "id", "type": "Long"}, {"id": "category", "type": "String"}],
             "columns": [{"id": "value", "type": "Double"}],
             "partition_key_length": 1}
        ]}"#,
    )
    .unwrap();
    workflow
        .execute(
            fixture.settings.clone(),
            HashMap::new(),
            &LocalParquetBackend::new(),
        )
        .unwrap();

    let batch = fixture.read("csv_frame", &["value"]).unwrap();
    assert_eq!(
        batch.column(0).as_primitive::<Int64Type>().values().to_vec(),
        vec![1, 2]
    );
    assert_eq!(
        batch.column(2).as_primitive::<Float64Type>().values().to_vec(),
        vec![1.5, 2.5]
    );
}
