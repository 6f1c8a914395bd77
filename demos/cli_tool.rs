//! CLI Tool Example
//!
//! This example demonstrates how to build a command-line importer on top of scoresheet:
//! a wide assessment export is imported into a JSON directory store, with an optional
//! preview of the extracted sections on stdout.
//!
//! Log verbosity follows `RUST_LOG` (default: `info`).

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::process;

use chrono::NaiveDate;
use scoresheet::{
    IngestBuilder, JsonDirStore, OutputFormat, ScoreSheetError, SectionTable, SheetSelector,
};
use tracing_subscriber::EnvFilter;

struct Options {
    input_path: String,
    store_dir: String,
    sheet_selector: SheetSelector,
    sections_path: Option<String>,
    reference_date: Option<NaiveDate>,
    preview: Option<OutputFormat>,
    persist_spans: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args);

    match run(&options) {
        Ok(message) => println!("{}", message),
        Err(e) => {
            handle_error(e);
            process::exit(1);
        }
    }
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <input> <store-dir> [options]", program);
    eprintln!("\nOptions:");
    eprintln!("  --sheet-index <n>         Select sheet by index (0-based, default 0)");
    eprintln!("  --sheet-name <name>       Select sheet by name");
    eprintln!("  --sections <table.json>   Load the section table from a JSON file");
    eprintln!("  --reference-date <date>   Date used when a row has no readable date (YYYY-MM-DD)");
    eprintln!("  --preview <markdown|json> Print the extracted sections to stdout");
    eprintln!("  --spans                   Also store blocks detected from the group header row");
    eprintln!("\nExamples:");
    eprintln!("  {} export.xlsx store", program);
    eprintln!("  {} export.csv store --preview markdown", program);
    eprintln!("  {} export.xlsx store --sheet-name \"評価一覧\"", program);
    process::exit(1);
}

fn parse_args(args: &[String]) -> Options {
    let program = args.first().map(String::as_str).unwrap_or("cli_tool");
    if args.len() < 3 {
        usage(program);
    }

    let mut options = Options {
        input_path: args[1].clone(),
        store_dir: args[2].clone(),
        sheet_selector: SheetSelector::default(),
        sections_path: None,
        reference_date: None,
        preview: None,
        persist_spans: false,
    };

    let value = |i: usize| -> &str {
        match args.get(i + 1) {
            Some(v) => v.as_str(),
            None => {
                eprintln!("Error: {} requires a value", args[i]);
                process::exit(1);
            }
        }
    };

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--sheet-index" => {
                let index = value(i).parse::<usize>().unwrap_or_else(|_| {
                    eprintln!("Error: Invalid sheet index: {}", value(i));
                    process::exit(1);
                });
                options.sheet_selector = SheetSelector::Index(index);
                i += 2;
            }
            "--sheet-name" => {
                options.sheet_selector = SheetSelector::Name(value(i).to_string());
                i += 2;
            }
            "--sections" => {
                options.sections_path = Some(value(i).to_string());
                i += 2;
            }
            "--reference-date" => {
                let date = NaiveDate::parse_from_str(value(i), "%Y-%m-%d").unwrap_or_else(|_| {
                    eprintln!("Error: Invalid date: {}", value(i));
                    process::exit(1);
                });
                options.reference_date = Some(date);
                i += 2;
            }
            "--preview" => {
                options.preview = match value(i) {
                    "markdown" | "md" => Some(OutputFormat::Markdown),
                    "json" => Some(OutputFormat::Json),
                    other => {
                        eprintln!("Error: Unknown preview format: {}", other);
                        process::exit(1);
                    }
                };
                i += 2;
            }
            "--spans" => {
                options.persist_spans = true;
                i += 1;
            }
            _ => {
                eprintln!("Error: Unknown option: {}", args[i]);
                usage(program);
            }
        }
    }
    options
}

fn run(options: &Options) -> Result<String, ScoreSheetError> {
    let mut builder = IngestBuilder::new()
        .with_sheet_selector(options.sheet_selector.clone())
        .persist_span_blocks(options.persist_spans);
    if let Some(path) = &options.sections_path {
        builder = builder.with_section_table(SectionTable::from_json(&fs::read_to_string(path)?)?);
    }
    if let Some(date) = options.reference_date {
        builder = builder.with_reference_date(date);
    }
    if let Some(format) = options.preview {
        builder = builder.with_output_format(format);
    }
    let importer = builder.build()?;

    let matrix = importer.read_matrix(BufReader::new(File::open(&options.input_path)?))?;
    let mut store = JsonDirStore::open(&options.store_dir)?;
    let summary = importer.import_matrix(&matrix, &mut store)?;

    if options.preview.is_some() {
        let (rows, _) = importer.build_documents(&matrix)?;
        let documents: Vec<_> = rows.into_iter().flat_map(|row| row.documents).collect();
        importer.render_preview(&documents, io::stdout().lock())?;
    }

    Ok(summary.message())
}

fn handle_error(error: ScoreSheetError) {
    match error {
        ScoreSheetError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        ScoreSheetError::Parse(parse_err) => {
            eprintln!("Parse Error: {}", parse_err);
            eprintln!("The file may not be a valid workbook or may be corrupted.");
        }
        ScoreSheetError::Json(json_err) => {
            eprintln!("JSON Error: {}", json_err);
            eprintln!("Please check the section table file.");
        }
        ScoreSheetError::MalformedInput { row, message } => {
            eprintln!("Malformed Input:");
            eprintln!("  Row: {}", row);
            eprintln!("  Details: {}", message);
        }
        ScoreSheetError::InvalidColumnLabel(label) => {
            eprintln!("Invalid Column Label: '{}'", label);
            eprintln!("Column labels are letters only (A, Z, AA, IP, ...).");
        }
        ScoreSheetError::Config(msg) => {
            eprintln!("Configuration Error: {}", msg);
            eprintln!("Please check your sheet selection or section table.");
        }
        ScoreSheetError::Persistence { section, message } => {
            eprintln!("Persistence Error:");
            eprintln!("  Section: {}", section);
            eprintln!("  Details: {}", message);
        }
    }
}
