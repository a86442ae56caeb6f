//! Alignment Test Generator driver
//!
//! Generates C programs probing `sizeof`/`_Alignof` over equivalence
//! classes of expressions, writes them under an output directory, and
//! optionally checks them with an external C compiler and analyzer.

mod runner;
mod sweep;

use anyhow::{bail, Result};
use atg_core::{Alignment, CType, ExpressionGenerator, GraphOptions};
use clap::Parser;
use std::path::PathBuf;
use sweep::{Compiler, SweepConfig};

#[derive(Parser, Debug)]
#[command(name = "atg", version, about = "Generate C programs that probe sizeof/_Alignof")]
struct Args {
    /// Generate and check programs for some number types
    #[arg(long, group = "types")]
    numbers: bool,

    /// Generate and check programs for pointers to some number types
    #[arg(long, group = "types")]
    pointers: bool,

    /// Construct graphs and print how many expressions each node has
    #[arg(long, group = "report")]
    print_nodes: bool,

    /// Construct graphs and print them in Graphviz dot format
    #[arg(long, alias = "dot", group = "report")]
    print_graphs: bool,

    /// Construct graphs and dump nodes and edges as JSON
    #[arg(long, group = "report")]
    dump_json: bool,

    /// Generate programs but do not compile or analyze them
    #[arg(short = 'g', long)]
    just_generate: bool,

    /// Generate prints instead of asserts and keep the compiled
    /// program's output for comparison
    #[arg(long)]
    prints: bool,

    /// Check every enumerated alignment attribute instead of no
    /// attribute plus the two nearest
    #[arg(long)]
    all_alignments: bool,

    /// Use GCC to check the testing model with static asserts
    #[arg(long, group = "compiler")]
    gcc: bool,

    /// Use Clang to check the testing model with static asserts
    #[arg(long, group = "compiler")]
    clang: bool,

    /// Command that runs the external analyzer on a generated program;
    /// its stdout must report `Verification result: TRUE.`
    #[arg(long, value_name = "COMMAND")]
    analyzer: Option<String>,

    /// How many self-loop operators to apply at the same time at most:
    /// 2 means `p + 0` and `p + 0 + 0` are added when `p` occurs
    #[arg(long, default_value_t = 2)]
    loop_depth: u32,

    /// How many times to traverse a reference/dereference cycle
    #[arg(long, default_value_t = 2)]
    cycle_depth: u32,

    /// For pointer expressions p add loops `p + 0` and `p + zero`
    #[arg(long)]
    pointer_arithmetic: bool,

    /// For number expressions v add loops and edges `v + 0`, `v + zero`
    #[arg(long)]
    number_arithmetic: bool,

    /// Directory generated programs are written to
    #[arg(long, default_value = "generated")]
    out_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let options = GraphOptions {
        cycle_depth: args.cycle_depth,
        loop_depth: args.loop_depth,
        pointer_arithmetic: args.pointer_arithmetic,
        number_arithmetic: args.number_arithmetic,
    };

    if args.print_nodes || args.print_graphs || args.dump_json {
        return report(&args, options);
    }

    let compiler = if args.gcc {
        Some(Compiler::Gcc)
    } else if args.clang {
        Some(Compiler::Clang)
    } else {
        None
    };

    if args.prints && compiler.is_none() && !args.just_generate {
        bail!("programs with prints require a compiler to run them");
    }
    if !args.numbers && !args.pointers {
        bail!(
            "specify --numbers to check some number types, \
             or --pointers to check some pointer types"
        );
    }

    let config = SweepConfig {
        options,
        out_dir: args.out_dir.clone(),
        all_alignments: args.all_alignments,
        just_generate: args.just_generate,
        prints: args.prints,
        compiler,
        analyzer: args
            .analyzer
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
    };

    if args.numbers {
        sweep::check_numbers(&config)
    } else {
        sweep::check_pointers(&config)
    }
}

/// Construct the graphs for both sweeps and print the requested view of
/// them instead of generating programs.
fn report(args: &Args, options: GraphOptions) -> Result<()> {
    let mut eg = ExpressionGenerator::new(options);
    let number = CType::int_type().declare("v", Alignment::NoAttr)?;
    let pointer = CType::pointer_to(CType::int_type()).declare("v", Alignment::NoAttr)?;
    eg.graph_for(&number)?;
    eg.graph_for(&pointer)?;

    if args.dump_json {
        let stats: std::collections::BTreeMap<String, _> = eg
            .graphs()
            .map(|(shape, graph)| (shape.to_string(), graph.stats()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if args.print_graphs {
        for (shape, graph) in eg.graphs() {
            print!("{}", graph.to_dot(&shape.to_string()));
        }
    } else {
        for (shape, graph) in eg.graphs() {
            println!("graph {}:", shape);
            print!("{}", graph);
        }
    }
    Ok(())
}
