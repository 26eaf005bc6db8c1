use ream::{CellValue, ContextValue, GenerateJob, RecordContext, RenderTask};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Primary table: three borrowers, one with an empty name and amount.
pub const BORROWERS_CSV: &str = "\
id,name,issue_date,amount,inn
1,Іван Петров,2024-01-15,16500,02896733
2,,2024-02-01,,00123
3,Ганна Ковальчук,2024-03-10,900.5,1234567
";

/// Auxiliary table joined on `id`: two rows for 1, one for 2, two for 3.
pub const PAYMENTS_CSV: &str = "\
id,pay_date,amount
1,2024-02-15,100
1,2024-03-15,200
2,2024-03-01,50
3,2024-04-01,300
3,2024-05-01,150
";

/// Auxiliary table without the key column; never joined.
pub const NOTES_CSV: &str = "\
text
hello
world
";

/// Scaffold a run directory: `tables/` with the given CSV files (the
/// first one is the primary), a template file, and an `out/` path for
/// results.
pub fn scaffold(files: &[(&str, &str)]) -> (TempDir, GenerateJob) {
    let dir = tempfile::tempdir().unwrap();
    let tables = dir.path().join("tables");
    fs::create_dir(&tables).unwrap();
    for (name, contents) in files {
        fs::write(tables.join(name), contents).unwrap();
    }
    let template = dir.path().join("letter.docx");
    fs::write(&template, b"TEMPLATE").unwrap();

    let job = GenerateJob::new(
        tables,
        files.first().map(|(name, _)| *name).unwrap_or("borrowers.csv"),
        template,
        dir.path().join("out"),
    );
    (dir, job)
}

/// The standard three-table scaffold used by most pipeline tests.
pub fn standard_scaffold() -> (TempDir, GenerateJob) {
    scaffold(&[
        ("borrowers.csv", BORROWERS_CSV),
        ("payments.csv", PAYMENTS_CSV),
        ("notes.csv", NOTES_CSV),
    ])
}

/// Sorted file names in the job's output directory.
pub fn output_names(job: &GenerateJob) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(&job.output_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn read_output(job: &GenerateJob, name: &str) -> String {
    fs::read_to_string(job.output_dir.join(name)).unwrap()
}

/// A bare context holding only `id_main`.
pub fn context_with_id(id: i64) -> RecordContext {
    let mut context = RecordContext::default();
    context.insert("id_main", ContextValue::Cell(CellValue::from(id)));
    context
}

/// Tasks 0..n with minimal contexts, writing into `output_dir`.
pub fn simple_tasks(n: usize, template: &Path, output_dir: &Path) -> Vec<RenderTask> {
    (0..n)
        .map(|i| {
            RenderTask::new(
                i,
                context_with_id(i as i64),
                template,
                output_dir,
                "name",
                "id",
            )
        })
        .collect()
}
