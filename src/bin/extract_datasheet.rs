//! CLI tool for datasheet parameter extraction

use datasheet_extractor::{extract_file, ParamValue, StyleLibrary};
use serde_json::json;
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <style_config.json> <pdf_file> [style_index] [--json]", args[0]);
        eprintln!();
        eprintln!("Extracts datasheet parameters with the chosen style (default 0)");
        eprintln!("and prints one block per detected document section.");
        process::exit(1);
    }

    let config_path = &args[1];
    let pdf_path = &args[2];
    let json_output = args.iter().any(|a| a == "--json");
    let style_index: usize = args
        .get(3)
        .filter(|a| *a != "--json")
        .map(|a| a.parse().unwrap_or(0))
        .unwrap_or(0);

    let library = match StyleLibrary::load(config_path) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Error loading style configuration: {}", e);
            process::exit(1);
        }
    };

    match extract_file(pdf_path, &library, style_index) {
        Ok(sections) => {
            if json_output {
                let report: Vec<_> = sections
                    .iter()
                    .enumerate()
                    .map(|(i, sheet)| {
                        let params: Vec<_> = sheet
                            .found_slots()
                            .map(|slot| {
                                json!({
                                    "name": slot.name(),
                                    "unit": slot.unit(),
                                    "value": match slot.value() {
                                        Some(ParamValue::Number(n)) => json!(n),
                                        Some(ParamValue::Text(t)) => json!(t),
                                        None => json!(null),
                                    },
                                })
                            })
                            .collect();
                        json!({ "section": i, "params": params })
                    })
                    .collect();
                println!("{}", json!(report));
            } else {
                println!("Datasheet Extraction");
                println!("====================");
                println!("File: {}", pdf_path);
                println!(
                    "Style: {}",
                    library.style_names().get(style_index).unwrap_or(&"?")
                );
                println!("Sections: {}", sections.len());

                for (i, sheet) in sections.iter().enumerate() {
                    println!();
                    println!("--- Section {} ---", i + 1);
                    for slot in sheet.found_slots() {
                        let value = match slot.value() {
                            Some(ParamValue::Number(n)) => n.to_string(),
                            Some(ParamValue::Text(t)) => t.clone(),
                            None => String::new(),
                        };
                        println!("{}: {}", slot.title(), value);
                    }
                }

                if sections.is_empty() {
                    println!();
                    println!("No matching sections found in this document.");
                    process::exit(2);
                }
            }
        }
        Err(e) => {
            if json_output {
                println!("{}", json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}
