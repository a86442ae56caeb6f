//! Type x machine x alignment sweeps over generated programs
//!
//! For every selected base type, every machine model and every chosen
//! pair of type/variable alignment attributes, one program per emission
//! mode is written under the output directory and optionally handed to
//! the external compiler and analyzer.

use crate::runner;
use anyhow::{Context, Result};
use atg_core::emit::{self, EmitMode};
use atg_core::{Alignment, CType, CTypeKind, ExpressionGenerator, Graph, GraphOptions, Machine, Variable};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Which external C compiler checks the static-assert programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compiler {
    Gcc,
    Clang,
}

impl Compiler {
    /// The compiler command with the strict flags generated programs
    /// are expected to compile under.
    fn command(self, machine: &Machine) -> Vec<String> {
        let mut cmd: Vec<String> = match self {
            Compiler::Gcc => vec!["gcc".to_string()],
            Compiler::Clang => vec!["clang".to_string()],
        };
        cmd.extend(
            ["-std=c11", "-Wall", "-Werror", "-Wno-unused-value", "-Wno-format"]
                .iter()
                .map(|s| s.to_string()),
        );
        if self == Compiler::Clang {
            cmd.extend(
                [
                    "-Wno-gnu-alignof-expression",
                    "-Wno-sizeof-array-decay",
                    "-Wno-address-of-packed-member",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        let target = match self {
            Compiler::Gcc => machine.gcc_option,
            Compiler::Clang => machine.clang_option,
        };
        cmd.push(target.to_string());
        cmd
    }
}

/// Everything one sweep needs to know.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub options: GraphOptions,
    pub out_dir: PathBuf,
    pub all_alignments: bool,
    pub just_generate: bool,
    pub prints: bool,
    pub compiler: Option<Compiler>,
    /// Analyzer command words; the machine option and the program path
    /// are appended per invocation.
    pub analyzer: Option<Vec<String>>,
}

/// Check expressions for an arbitrary number type on char, short, int
/// and long double.
pub fn check_numbers(config: &SweepConfig) -> Result<()> {
    let mut eg = ExpressionGenerator::new(config.options);
    for ctype in [
        CType::char_type(),
        CType::short_type(),
        CType::int_type(),
        CType::long_double_type(),
    ] {
        check_type(config, &mut eg, "numbers", &ctype)?;
    }
    Ok(())
}

/// Check expressions for pointers to the number types of
/// [`check_numbers`], plus pointer to void.
pub fn check_pointers(config: &SweepConfig) -> Result<()> {
    let mut eg = ExpressionGenerator::new(config.options);
    for ctype in [
        CType::char_type(),
        CType::short_type(),
        CType::int_type(),
        CType::long_double_type(),
    ] {
        check_type(config, &mut eg, "pointers", &CType::pointer_to(ctype))?;
    }

    // number arithmetic has no meaning behind a void pointer; use a
    // generator without it so the void graph is built consistently
    let mut eg = if config.options.number_arithmetic {
        ExpressionGenerator::new(GraphOptions {
            number_arithmetic: false,
            ..config.options
        })
    } else {
        eg
    };
    check_type(
        config,
        &mut eg,
        "pointers",
        &CType::pointer_to(CType::void()),
    )?;
    Ok(())
}

/// Short directory name for a type: its spelling, or the referenced
/// type's nick with a `P` (pointer) or `A` (array) suffix.
pub fn nick(ctype: &CType) -> String {
    if let Some(name) = ctype.spelling() {
        return name.replace(' ', "-");
    }
    match &ctype.kind {
        CTypeKind::Pointer(referenced) => format!("{}P", nick(referenced)),
        CTypeKind::Array { element, .. } => format!("{}A", nick(element)),
        // spelling() covers void and numbers
        CTypeKind::Void | CTypeKind::Number(_) => unreachable!(),
    }
}

/// The alignment attributes to check for a type on a machine: all of
/// them, or no attribute plus the two nearest to the type's default.
pub fn alignments_to_check(config: &SweepConfig, machine: &Machine, ctype: &CType) -> Vec<Alignment> {
    if config.all_alignments {
        Alignment::enumerated()
    } else {
        let default_align = machine.size_align_of(ctype).align;
        let (below, above) = Alignment::two_nearest(default_align);
        vec![Alignment::NoAttr, below, above]
    }
}

/// Generate (and optionally check) the programs for one base type.
fn check_type(
    config: &SweepConfig,
    eg: &mut ExpressionGenerator,
    subdir: &str,
    ctype: &CType,
) -> Result<()> {
    info!("checking type {}", nick(ctype));
    let dir = config.out_dir.join(subdir).join(nick(ctype));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    for machine in Machine::models() {
        info!("  checking machine {}", machine.name);
        let alignments = alignments_to_check(config, &machine, ctype);

        for type_align in &alignments {
            info!("    checking type align {}", type_align.code());
            let typed = if *type_align == Alignment::NoAttr {
                ctype.clone()
            } else {
                ctype.with_typedef("t", *type_align)?
            };

            for var_align in &alignments {
                info!("      checking var align {}", var_align.code());
                let variable = typed.declare("v", *var_align)?;
                let graph = eg.graph_for(&variable)?;
                let stem = format!("{}v{}", type_align.code(), var_align.code());

                if config.prints {
                    let path =
                        write_program(&dir, &stem, EmitMode::Prints, &machine, graph, &variable)?;
                    if !config.just_generate {
                        if let Some(compiler) = config.compiler {
                            runner::compile_and_run(&compiler.command(&machine), &path)?;
                        }
                    }
                    continue;
                }

                if let Some(compiler) = config.compiler {
                    let path = write_program(
                        &dir,
                        &stem,
                        EmitMode::StaticAsserts,
                        &machine,
                        graph,
                        &variable,
                    )?;
                    if !config.just_generate {
                        // the compiler checks our expectations at
                        // compile time
                        let mut cmd = compiler.command(&machine);
                        cmd.push("-fsyntax-only".to_string());
                        cmd.push(path.display().to_string());
                        runner::run(&cmd)?;
                    }
                }

                let path =
                    write_program(&dir, &stem, EmitMode::Asserts, &machine, graph, &variable)?;
                if !config.just_generate {
                    if let Some(analyzer) = &config.analyzer {
                        let mut cmd = analyzer.clone();
                        cmd.push(machine.analyzer_option.to_string());
                        runner::check_analyzer(&cmd, &path)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Emit one program file and return its path.
fn write_program(
    dir: &Path,
    stem: &str,
    mode: EmitMode,
    machine: &Machine,
    graph: &Graph,
    variable: &Variable,
) -> Result<PathBuf> {
    let text = emit::program_text(graph, variable, machine, mode)?;
    let path = dir.join(format!("{}-{}-{}.c", stem, mode.slug(), machine.name));
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
