// graftreads: Placement of sequencing reads onto a reference alignment tree.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::fs::File;
use std::io::Write;

use clap::CommandFactory;
use clap::Parser;

use graftreads::aligner::SimpleAligner;
use graftreads::local::Exonerate;
use graftreads::local::LocalAligner;
use graftreads::reads::io::create_output;
use graftreads::reads::io::write_reads;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) -> Result<(), E> {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()?;
    Ok(())
}

fn verbosity(verbose: bool, silent: bool) -> usize {
    if silent { 0 } else if verbose { 2 } else { 1 }
}

fn run(command: &cli::Commands) -> Result<(), E> {
    let aligner = SimpleAligner::default();

    match command {
        // Merge
        cli::Commands::Merge {
            input_file,
            out_file,
            settings,
            verbose,
            silent,
        } => {
            init_log(verbosity(*verbose, *silent))?;
            let settings = settings.to_settings();

            let conn_in = File::open(input_file)?;
            let mut conn_out = create_output(out_file)?;
            graftreads::merge_reads_from_read_to_write(conn_in, &mut conn_out, &aligner, &settings)?;
        },

        // Place
        cli::Commands::Place {
            input_file,
            reference_file,
            out_file,
            report_file,
            reads_out_file,
            exonerate,
            settings,
            verbose,
            silent,
        } => {
            init_log(verbosity(*verbose, *silent))?;
            let settings = settings.to_settings();

            let mut tree = graftreads::reference_tree_from_read(File::open(reference_file)?, &aligner, &settings)?;

            let helper = Exonerate::new(exonerate, settings.helper_timeout);
            let local: Option<&dyn LocalAligner> = if settings.use_local_helper() { Some(&helper) } else { None };
            let summary = graftreads::place_reads_from_read(&mut tree, File::open(input_file)?, &aligner, local, &settings, 1)?;

            if let Some(path) = report_file {
                let mut conn_out = create_output(path)?;
                summary.report.write_to(&mut conn_out)?;
            }
            if let Some(path) = reads_out_file {
                let mut conn_out = create_output(path)?;
                write_reads(&summary.reads, &mut conn_out)?;
            }

            let newick = tree.to_newick();
            match out_file {
                Some(path) => {
                    let mut conn_out = create_output(path)?;
                    writeln!(conn_out, "{}", newick)?;
                    conn_out.flush()?;
                },
                None => {
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{}", newick)?;
                },
            }
        },
    }
    Ok(())
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    let Some(command) = &cli.command else {
        let _ = cli::Cli::command().print_help();
        return;
    };

    if let Err(e) = run(command) {
        eprintln!("graftreads: {}", e);
        std::process::exit(1);
    }
}
