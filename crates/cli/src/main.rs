use std::time::Duration;
use std::{fs, process};

use adya_core::{check_history, CheckOptions, Validity};
use adya_cli::{App, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Check(args) => check(args),
    }
}

fn generate(args: &adya_cli::GenerateArgs) {
    fs::create_dir_all(&args.output_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    });

    let mut params = adya_testgen::GeneratorParams::builder()
        .key_dist(args.key_dist.into())
        .build();
    params.key_count = args.key_count;

    let histories =
        adya_testgen::generate_mult_histories(args.n_hist, args.n_txn, args.n_process, &params);

    for history in &histories {
        let path = args.output_dir.join(format!("{}.json", history.get_id()));
        let file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        serde_json::to_writer_pretty(file, history).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        });
    }

    println!(
        "Generated {} histories to {}",
        histories.len(),
        args.output_dir.display()
    );
}

fn check(args: &adya_cli::CheckArgs) {
    let options = CheckOptions {
        consistency_models: vec![args.consistency.into()],
        cycle_search_timeout: Duration::from_millis(args.cycle_search_timeout),
        ..CheckOptions::default()
    };

    let mut entries: Vec<_> = fs::read_dir(&args.input_dir)
        .unwrap_or_else(|e| {
            eprintln!("Failed to read input directory: {e}");
            process::exit(1);
        })
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();

    entries.sort_by_key(fs::DirEntry::path);

    if entries.is_empty() {
        eprintln!("No .json files found in {}", args.input_dir.display());
        process::exit(1);
    }

    let mut any_invalid = false;

    for entry in entries {
        let path = entry.path();
        let filename = path.file_name().unwrap_or_default().to_string_lossy();

        let file = fs::File::open(&path).unwrap_or_else(|e| {
            eprintln!("Failed to open {filename}: {e}");
            process::exit(1);
        });

        let history: adya_testgen::History =
            serde_json::from_reader(file).unwrap_or_else(|e| {
                eprintln!("Failed to parse {filename}: {e}");
                process::exit(1);
            });

        match check_history(&options, history.get_data()) {
            Ok(verdict) => {
                if args.json {
                    let line = serde_json::to_string(&verdict).unwrap_or_else(|e| {
                        eprintln!("Failed to render verdict for {filename}: {e}");
                        process::exit(1);
                    });
                    println!("{line}");
                } else {
                    match verdict.valid {
                        Validity::Valid => println!("{filename}: PASS"),
                        Validity::Unknown => {
                            println!("{filename}: UNKNOWN ({:?})", verdict.anomaly_types);
                        }
                        Validity::Invalid => {
                            println!("{filename}: FAIL ({:?})", verdict.anomaly_types);
                        }
                    }
                }

                if let Some(directory) = &args.directory {
                    write_reports(directory, &verdict);
                }

                if verdict.valid == Validity::Invalid {
                    any_invalid = true;
                }
            }
            Err(e) => {
                println!("{filename}: MALFORMED ({e:?})");
                any_invalid = true;
            }
        }
    }

    if any_invalid {
        process::exit(1);
    }
}

/// Write one `<anomaly-type>.txt` per reported type.
fn write_reports(directory: &std::path::Path, verdict: &adya_core::Verdict<u64, u64>) {
    use std::io::Write;

    fs::create_dir_all(directory).unwrap_or_else(|e| {
        eprintln!("Failed to create report directory: {e}");
        process::exit(1);
    });

    for (anomaly_type, anomalies) in &verdict.anomalies {
        let path = directory.join(format!("{anomaly_type}.txt"));
        let mut file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        for anomaly in anomalies {
            writeln!(file, "{anomaly:?}").unwrap_or_else(|e| {
                eprintln!("Failed to write {}: {e}", path.display());
                process::exit(1);
            });
        }
    }
}
