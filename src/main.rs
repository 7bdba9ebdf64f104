/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use sbgen::arch::{Architecture, Side};
use sbgen::arch_loader::{self, OpenOpts};
use sbgen::error::BuildError;
use sbgen::exporter::{CompoundJsonExporter, Exporter};
use sbgen::stamper::{self, StampPlan};
use sbgen::switchblock::{MultiThreadedBuilder, SwitchblockBuilder, SwitchblockLookup};
#[allow(unused)]
use sbgen::log::*;
#[allow(unused)]
use sbgen::dbg_log;

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.1.0",
    about = "SBGEN - FPGA switchblock connectivity generator",
    long_about = None
)]
struct Args {
    #[clap(help = "Architecture records (YAML or JSON)")]
    arch: String,
    #[clap(long, help = "Architecture file is gzip-compressed")]
    gz: bool,
    #[clap(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct BuildCmd {
    #[clap(
        long,
        default_value = "1",
        help = "Number of threads to be used for building the connection map"
    )]
    threads: usize,
    #[clap(long, help = "Compute every tile instead of stamping the periodic ones")]
    no_stamp: bool,
    #[clap(long, help = "Export the connection map to a JSON file (.gz to compress)")]
    json: Option<String>,
}

#[derive(Parser, Debug)]
struct QueryCmd {
    #[clap(help = "Tile X coordinate")]
    x: usize,
    #[clap(help = "Tile Y coordinate")]
    y: usize,
    #[clap(help = "Side the source track enters from: top, right, bottom, left (or t, r, b, l)")]
    from: Side,
    #[clap(help = "Side the connection leaves through")]
    to: Side,
    #[clap(help = "Source track index")]
    track: usize,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    Build(BuildCmd),
    Query(QueryCmd),
}

#[derive(Serialize)]
struct BuildSummary {
    keys: usize,
    connections: usize,
    stamp_period: Option<usize>,
    max_lcm: usize,
    threads: usize,
}

fn fail(err: BuildError) -> ! {
    eprintln!("Build failed: {}", err);
    std::process::exit(1);
}

fn build(args: BuildCmd, arch: Architecture) {
    let builder = SwitchblockBuilder::new(&arch).unwrap_or_else(|e| fail(e));

    let plan = if args.no_stamp { None } else { StampPlan::new(builder.context()) };
    let stamp_period = plan.as_ref().map(|plan| plan.period);
    let max_lcm = stamper::max_lcm(builder.context());

    let builder = Arc::new(builder);
    let map = if args.threads == 1 {
        match &plan {
            Some(plan) => stamper::stampout(&builder, plan),
            None => builder.build_direct(),
        }
    } else {
        Arc::clone(&builder).build_multithreaded(args.threads, !args.no_stamp)
    };
    let map = map.unwrap_or_else(|e| fail(e));

    let device = &builder.context().device;
    println!(concat!(
        "Switchblock connections:\n",
        "    Device:                 {}x{}, W={}, {}\n",
        "    Stamp period:           {}\n",
        "    Max. lcm:               {}\n",
        "    No. of keys:            {}\n",
        "    No. of connections:     {}"
        ),
        device.width,
        device.height,
        device.channel_width,
        builder.context().directionality,
        stamp_period.map_or("none (direct build)".to_string(), |p| p.to_string()),
        max_lcm,
        map.len(),
        map.connection_count()
    );

    if let Some(json) = &args.json {
        let summary = BuildSummary {
            keys: map.len(),
            connections: map.connection_count(),
            stamp_period,
            max_lcm,
            threads: args.threads,
        };
        let mut exporter = CompoundJsonExporter::new(json);
        exporter.export("summary", &summary)
            .and_then(|_| exporter.export(
                "switchblocks",
                &map.with_extras(builder.context(), stamp_period)
            ))
            .and_then(|_| exporter.flush())
            .expect("Couldn't export the connection map");
        dbg_log!(DBG_INFO, "Exported connection map to {}", json);
    }
}

fn query(args: QueryCmd, arch: Architecture) {
    let builder = SwitchblockBuilder::new(&arch).unwrap_or_else(|e| fail(e));
    let map = builder.compute_tile(args.x, args.y).unwrap_or_else(|e| fail(e));

    let key = SwitchblockLookup::new(args.x, args.y, args.from, args.to, args.track);
    match map.get(&key) {
        Some(tos) => {
            println!("Track {} at ({}, {}), {} -> {}:", args.track, args.x, args.y, args.from, args.to);
            for to in tos {
                println!("    track {} via {}", to.to_track, to.switch_name);
            }
        },
        None => println!("No connections for {}", key),
    }
}

fn main() {
    let args = Args::parse();

    if let SubCommands::Build(build) = &args.command {
        assert!(build.threads != 0);
    }

    let arch = arch_loader::open(&args.arch, OpenOpts { gz: args.gz })
        .expect("Couldn't open architecture file");

    match args.command {
        SubCommands::Build(sargs) => build(sargs, arch),
        SubCommands::Query(sargs) => query(sargs, arch),
    }
}
