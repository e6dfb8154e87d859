// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! hwsense-dump - Inspect the sensor shared-memory export
//!
//! Attaches to the export, runs one decode pass, and prints the sensor
//! catalog. With `--demo` it instead publishes a synthetic export so
//! the engine can be exercised on machines without the monitor.

use clap::Parser;
use colored::*;
use hwsense::config::{READING_RECORD_MIN, SEGMENT_NAME, SUPERBLOCK_LEN, SUPERBLOCK_SIGNATURE};
use hwsense::{
    Engine, EngineConfig, RawCategory, RawReading, SensorRegion, SensorType, Superblock,
};
use std::time::Duration;

/// Inspect the sensor shared-memory export
#[derive(Parser, Debug)]
#[command(name = "hwsense-dump")]
#[command(version)]
#[command(about = "Inspect the sensor shared-memory export")]
struct Args {
    /// Output format: pretty, json
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// Emit the abridged record shape
    #[arg(short, long)]
    mini: bool,

    /// Emit the identity-keyed map instead of the display-ordered list
    #[arg(long)]
    map: bool,

    /// Publish a synthetic export and keep it updating (Ctrl+C to quit)
    #[arg(long)]
    demo: bool,

    /// Segment name to attach to (or publish with --demo)
    #[arg(default_value = SEGMENT_NAME)]
    segment: String,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "p" => Ok(OutputFormat::Pretty),
            "json" | "j" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

fn main() {
    let args = Args::parse();
    let result = if args.demo {
        run_demo(&args.segment)
    } else {
        run_dump(&args)
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_dump(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::for_segment(&args.segment);
    // One-shot inspection: attach even when the monitor process name is
    // not visible (containers, demo exports).
    config.require_monitor = false;

    let engine = Engine::launch(config)?;
    engine.stop();

    match args.format {
        OutputFormat::Json => {
            let text = if args.mini {
                engine.to_json_mini(!args.map)?
            } else {
                engine.to_json(!args.map)?
            };
            println!("{text}");
        }
        OutputFormat::Pretty => print_pretty(&engine),
    }

    Ok(())
}

fn print_pretty(engine: &Engine) {
    let stats = engine.stats();
    println!(
        "{} {} categories, {} readings, last poll {:.3} ms",
        "export:".bold(),
        stats.categories,
        stats.readings,
        stats.last_poll_ms
    );
    println!();
    println!(
        "{:>5}  {:<12} {:<34} {:>14}  {:<8} {}",
        "#".bold(),
        "TYPE".bold(),
        "NAME".bold(),
        "VALUE".bold(),
        "UNIT".bold(),
        "CATEGORY".bold()
    );

    for rec in engine.ordered() {
        let type_label = match rec.reading_type {
            SensorType::Temperature => rec.reading_type.label().red(),
            SensorType::Voltage | SensorType::Current | SensorType::Power => {
                rec.reading_type.label().yellow()
            }
            SensorType::Fan | SensorType::Usage | SensorType::Frequency => {
                rec.reading_type.label().cyan()
            }
            _ => rec.reading_type.label().normal(),
        };
        println!(
            "{:>5}  {:<12} {:<34} {:>14.3}  {:<8} {}",
            rec.index_order,
            type_label,
            rec.name_custom,
            rec.value,
            rec.unit,
            rec.parent_name_default.dimmed()
        );
    }
}

/// Publish a synthetic export with drifting values.
fn run_demo(segment: &str) -> Result<(), Box<dyn std::error::Error>> {
    const CATEGORY_STRIDE: usize = 264;
    let stride = READING_RECORD_MIN;

    let categories = [
        RawCategory {
            id: 0xF100,
            instance: 0,
            name_default: "CPU [#0]: Demo".to_string(),
            name_custom: "CPU".to_string(),
        },
        RawCategory {
            id: 0xF200,
            instance: 0,
            name_default: "GPU: Demo".to_string(),
            name_custom: "GPU".to_string(),
        },
    ];

    let mut readings = vec![
        demo_reading(0, 10, SensorType::Temperature, "CPU Package", "°C", 45.0),
        demo_reading(0, 11, SensorType::Usage, "Total CPU Usage", "%", 12.0),
        demo_reading(0, 12, SensorType::Voltage, "Vcore", "V", 1.25),
        demo_reading(1, 20, SensorType::Temperature, "GPU Temperature", "°C", 55.0),
        demo_reading(1, 21, SensorType::Power, "GPU Power (Total)", "W", 180.0),
    ];

    let category_offset = SUPERBLOCK_LEN;
    let reading_offset = category_offset + categories.len() * CATEGORY_STRIDE;
    let total = reading_offset + readings.len() * stride;

    let region = SensorRegion::create(segment, total)?;
    let superblock = Superblock {
        signature: SUPERBLOCK_SIGNATURE,
        version: 2,
        revision: 0,
        last_poll_unix: 0,
        category_offset: category_offset as u32,
        category_stride: CATEGORY_STRIDE as u32,
        category_count: categories.len() as u32,
        reading_offset: reading_offset as u32,
        reading_stride: stride as u32,
        reading_count: readings.len() as u32,
    };
    region.write_bytes(0, &superblock.encode())?;
    for (i, cat) in categories.iter().enumerate() {
        region.write_bytes(
            (category_offset + i * CATEGORY_STRIDE) as u64,
            &cat.encode(CATEGORY_STRIDE),
        )?;
    }

    println!(
        "{} publishing demo export at {} ({} readings); Ctrl+C to quit",
        "demo:".green().bold(),
        segment,
        readings.len()
    );

    let mut tick = 0u64;
    loop {
        for (i, r) in readings.iter_mut().enumerate() {
            // Deterministic drift, different phase per reading.
            let phase = (tick + i as u64 * 7) as f64;
            drift(r, phase);
            region.write_bytes((reading_offset + i * stride) as u64, &r.encode(stride))?;
        }
        tick += 1;
        std::thread::sleep(Duration::from_millis(500));
    }
}

fn demo_reading(
    category_index: u32,
    sensor_id: u32,
    kind: SensorType,
    name: &str,
    unit: &str,
    value: f64,
) -> RawReading {
    RawReading {
        kind,
        category_index,
        sensor_id,
        name_default: name.to_string(),
        name_custom: name.to_string(),
        unit: unit.to_string(),
        value,
        value_min: value,
        value_max: value,
        value_avg: value,
    }
}

/// Wobble a reading around its average, tracking min/max.
fn drift(r: &mut RawReading, phase: f64) {
    let base = r.value_avg;
    r.value = base + (phase * 0.7).sin() * base * 0.05;
    r.value_min = r.value_min.min(r.value);
    r.value_max = r.value_max.max(r.value);
}
