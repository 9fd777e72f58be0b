use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command, ValueHint};
use ptmloc_cli::input::Input;
use ptmloc_cli::runner::Runner;
use rayon::ThreadPoolBuilder;

fn path_arg(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help(help)
        .value_hint(ValueHint::FilePath)
}

fn modification_args(command: Command) -> Command {
    command
        .arg(path_arg("modfile", "MS-GF+ modification file"))
        .arg(
            Arg::new("labileptms")
                .long("labileptms")
                .num_args(1..)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Modifications to localize, by name or as an inline \
                     `mass,residues,opt,position,name` row",
                ),
        )
        .arg(
            Arg::new("mods")
                .long("mods")
                .num_args(1..)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Other modifications searched for, reported at their searched site"),
        )
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PTMLOC_LOG", "error,ptmloc=info"))
        .init();

    let prepare = Command::new("prepare")
        .about("Write LuciPHOr2 configuration and input PSMs from an MS-GF+ PSM table")
        .arg(path_arg("psmfile", "MS-GF+ PSM table"))
        .arg(path_arg("template", "LuciPHOr2 configuration template"))
        .arg(
            path_arg("outfile", "Path LuciPHOr2 writes its results to")
                .short('o')
                .value_hint(ValueHint::AnyPath),
        )
        .arg(path_arg("lucipsms", "Path of the LuciPHOr2 input PSM table to write"))
        .arg(path_arg(
            "config-out",
            "Path of the LuciPHOr2 configuration to write (default = luciphor_config.txt)",
        ))
        .arg(path_arg(
            "msgf-modfile",
            "Also write an MS-GF+ modification file with adjusted masses",
        ))
        .arg(
            Arg::new("ms2-tolerance")
                .long("ms2-tolerance")
                .value_parser(value_parser!(f64))
                .help("Fragment tolerance. Overrides MS2TOLVALUE")
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("ms2-tolerance-type")
                .long("ms2-tolerance-type")
                .value_parser(["Da", "ppm"])
                .help("Fragment tolerance unit. Overrides MS2TOLTYPE"),
        );

    let annotate = Command::new("annotate")
        .about("Annotate LuciPHOr2 results with modification names and alternative sites")
        .arg(path_arg("luciphor-results", "LuciPHOr2 results table"))
        .arg(path_arg(
            "luciphor-scores",
            "LuciPHOr2 permutation score table, for alternative localizations",
        ))
        .arg(path_arg(
            "psmfile",
            "MS-GF+ PSM table, to report modifications that were not localized",
        ))
        .arg(
            Arg::new("min-score")
                .long("min-score")
                .value_parser(value_parser!(f64))
                .help("Report alternative localizations scoring above this (default = 0)")
                .value_hint(ValueHint::Other),
        )
        .arg(
            path_arg("output", "Path of the annotated PSM table to write")
                .short('o')
                .value_hint(ValueHint::AnyPath),
        );

    let matches = Command::new("ptmloc")
        .version(clap::crate_version!())
        .about("Localize PTMs of MS-GF+ identifications with LuciPHOr2")
        .subcommand_required(true)
        .arg(
            Arg::new("parameters")
                .long("parameters")
                .global(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(value_parser!(u16).range(1..))
                .help("Number of worker threads (default = # of CPUs)")
                .value_hint(ValueHint::Other),
        )
        .subcommand(modification_args(prepare))
        .subcommand(modification_args(annotate))
        .get_matches();

    let Some((name, sub)) = matches.subcommand() else {
        anyhow::bail!("a subcommand is required. For more information try '--help'");
    };

    let threads = sub
        .get_one::<u16>("threads")
        .copied()
        .map(usize::from)
        .unwrap_or_else(num_cpus::get);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to configure thread pool")?;

    let input = Input::from_arguments(sub)?;
    match name {
        "prepare" => {
            let settings = input.build_prepare()?;
            Runner::new(&settings.mods)?.prepare(&settings)
        }
        "annotate" => {
            let settings = input.build_annotate()?;
            Runner::new(&settings.mods)?.annotate(&settings)
        }
        _ => unreachable!("unknown subcommand {}", name),
    }
}
