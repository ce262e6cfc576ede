//! rowforge – command-line batch PDF generator.
//!
//! Usage:
//!   rowforge <data.csv|data.xlsx> <template.json> [out_dir] [flags]
//!   rowforge --scaffold <data.csv|data.xlsx>
//!
//! One `document-<n>.pdf` is written per data row. If `out_dir` is omitted
//! the documents go to `<data stem>-documents/` next to the data file.

use std::{env, fs, path::PathBuf, process};

use rowforge::editor::TemplateEditor;
use rowforge::export::export_all;
use rowforge::pipeline::{BatchRenderer, FailurePolicy, RenderConfig};
use rowforge::render::UnmappablePolicy;
use rowforge::template::{ElementUpdate, Orientation, StylePatch, Template};
use rowforge::TabularData;

/// Vertical distance between scaffolded fields, in points.
const SCAFFOLD_SPACING: f32 = 24.0;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut positional: Vec<PathBuf> = Vec::new();
    let mut landscape = false;
    let mut scaffold = false;
    let mut title: Option<String> = None;
    let mut config = RenderConfig::default();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--scaffold" => scaffold = true,
            "--per-row-errors" => config.failure_policy = FailurePolicy::ReportPerRow,
            "--strict-encoding" => config.unmappable = UnmappablePolicy::Error,
            "--parallel" => config.parallel = true,
            "--title" | "-t" => match iter.next() {
                Some(v) => title = Some(v.clone()),
                None => fail(&args[0], "--title needs a value"),
            },
            "--max-rows" => match iter.next().and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => config.max_rows = Some(n),
                None => fail(&args[0], "--max-rows needs a non-negative integer"),
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => fail(&args[0], &format!("Unknown flag: {other}")),
            path => positional.push(PathBuf::from(path)),
        }
    }

    let Some(data_path) = positional.first().cloned() else {
        fail(&args[0], "Error: no data file specified.");
    };

    let data = match TabularData::from_path(&data_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", data_path.display());
            process::exit(1);
        }
    };

    if scaffold {
        let mut template = scaffold_template(&data);
        if landscape {
            template.orientation = Orientation::Landscape;
        }
        println!("{}", template.to_json());
        return;
    }

    let Some(template_path) = positional.get(1) else {
        fail(&args[0], "Error: no template file specified.");
    };
    if positional.len() > 3 {
        fail(&args[0], &format!("Unexpected argument: {}", positional[3].display()));
    }

    let mut template = match fs::read_to_string(template_path)
        .map_err(|e| e.to_string())
        .and_then(|json| Template::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", template_path.display());
            process::exit(1);
        }
    };
    if landscape {
        template.orientation = Orientation::Landscape;
    }
    for column in template.missing_columns(&data.headers) {
        log::warn!("Template field {column:?} is not a column of the data");
    }

    // Default output: `<stem>-documents/` beside the data file.
    let out_dir = positional.get(2).cloned().unwrap_or_else(|| {
        let stem = data_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("rowforge");
        data_path.with_file_name(format!("{stem}-documents"))
    });

    config.title = title.unwrap_or_else(|| {
        template_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("rowforge output")
            .to_string()
    });

    let renderer = BatchRenderer::new(config);
    let outcome = match renderer.run(&template, &data.rows, &mut ()) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error generating documents: {e}");
            process::exit(1);
        }
    };

    for failure in &outcome.failures {
        eprintln!("Row {} skipped: {}", failure.row_index + 1, failure.error);
    }
    if let Some(reason) = outcome.stopped {
        eprintln!(
            "Stopped early ({reason:?}) after {} of {} rows",
            outcome.documents.len() + outcome.failures.len(),
            outcome.total_rows
        );
    }

    match export_all(&outcome.documents, &out_dir) {
        Ok(paths) => {
            let n = paths.len();
            eprintln!(
                "Wrote {} document{} to '{}'",
                n,
                if n == 1 { "" } else { "s" },
                out_dir.display()
            );
        }
        Err(e) => {
            eprintln!("Error writing to '{}': {e}", out_dir.display());
            process::exit(1);
        }
    }

    if !outcome.failures.is_empty() {
        process::exit(2);
    }
}

/// One field per header, stacked down the page from the default position.
fn scaffold_template(data: &TabularData) -> Template {
    let mut editor = TemplateEditor::new();
    for (i, header) in data.headers.iter().enumerate() {
        let id = editor.add_field(header);
        let y = editor.element(&id).map(|el| el.style.y).unwrap_or(0.0);
        editor.update_element(
            &id,
            &ElementUpdate::style(StylePatch {
                y: Some(y + i as f32 * SCAFFOLD_SPACING),
                ..StylePatch::default()
            }),
        );
    }
    editor.complete()
}

fn fail(prog: &str, msg: &str) -> ! {
    eprintln!("{msg}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("rowforge – one PDF per spreadsheet row");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <data.csv|data.xlsx> <template.json> [out_dir] [flags]");
    eprintln!("  {prog} --scaffold <data.csv|data.xlsx> [--landscape]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <data>           CSV/delimited text or XLSX workbook (first sheet is used)");
    eprintln!("  <template.json>  Layout saved by the designer");
    eprintln!("  [out_dir]        Output directory (default: <data stem>-documents)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --title, -t        Document title in PDF metadata (default: template file stem)");
    eprintln!("  --landscape, -l    Force landscape A4 (841.89×595.28 pt)");
    eprintln!("  --per-row-errors   Skip failing rows instead of aborting the batch");
    eprintln!("  --strict-encoding  Fail rows with characters the builtin fonts cannot show");
    eprintln!("  --parallel         Render rows on all cores");
    eprintln!("  --max-rows N       Render at most N rows");
    eprintln!("  --scaffold         Print a starter template with one field per column");
    eprintln!("  --help             Print this message");
}
