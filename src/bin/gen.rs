//! nchnroutes: generate and check BIRD route files from an IPDB database.

use clap::{Parser, Subcommand};
use nchnroutes::{
    output, pipeline, AddressFamily, BirdFlavor, ClassifyStats, FamilyOutput, FileKind,
    IpdbReader, Validator,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nchnroutes")]
#[command(version = "0.1.0")]
#[command(about = "Generate BIRD routing tables for non-mainland-China address space", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate route files from an IPDB database
    Generate {
        /// IPDB database file (may be gzip-compressed)
        #[arg(short, long)]
        db: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Interface name in the route lines
        #[arg(short, long, default_value = "wg0")]
        interface: String,

        /// Emit `define NAME = [ ... ];` sets instead of route lines
        #[arg(long)]
        define: bool,

        /// Fan classification out across worker threads
        #[arg(short, long)]
        parallel: bool,
    },

    /// Check generated route files against the database by sampling
    Check {
        /// IPDB database file (may be gzip-compressed)
        #[arg(short, long)]
        db: PathBuf,

        /// Directory holding the generated files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Sampled addresses per CIDR
        #[arg(short, long, default_value_t = 5)]
        samples: usize,

        /// Skip the mainland route files
        #[arg(long)]
        skip_china: bool,

        /// Skip the non-mainland config files
        #[arg(long)]
        skip_non_china: bool,

        /// Print each offending sample
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            db,
            output_dir,
            interface,
            define,
            parallel,
        } => {
            if let Err(e) = generate(&db, &output_dir, &interface, define, parallel) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check {
            db,
            output_dir,
            samples,
            skip_china,
            skip_non_china,
            verbose,
        } => match check(&db, &output_dir, samples, skip_china, skip_non_china, verbose) {
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            Ok(false) => std::process::exit(1),
            Ok(true) => {}
        },
    }
}

fn generate(
    db: &Path,
    output_dir: &Path,
    interface: &str,
    define: bool,
    parallel: bool,
) -> nchnroutes::Result<()> {
    log::info!("loading database {}", db.display());
    let reader = IpdbReader::open(db)?;

    let meta = reader.metadata();
    let mut families = Vec::new();
    if meta.has_ipv4() {
        families.push("IPv4");
    }
    if meta.has_ipv6() {
        families.push("IPv6");
    }
    log::info!(
        "database: build={} families=[{}] nodes={} fields={:?}",
        meta.build,
        families.join(", "),
        meta.node_count,
        meta.fields
    );

    let out = pipeline::run(&reader, parallel)?;
    log_stats(&out.v4);
    log_stats(&out.v6);

    std::fs::create_dir_all(output_dir)?;

    // Emit failures are collected so one file never blocks the others.
    let mut failures = Vec::new();
    let mut save = |result: nchnroutes::Result<()>, path: &Path| match result {
        Ok(()) => log::info!("wrote {}", path.display()),
        Err(e) => {
            log::error!("failed to write {}: {}", path.display(), e);
            failures.push(e);
        }
    };

    for family_out in [&out.v4, &out.v6] {
        let flavor = if define {
            BirdFlavor::define_for(family_out.family)
        } else {
            BirdFlavor::Route {
                iface: interface.to_string(),
            }
        };

        let bird = output_dir.join(bird_file(family_out.family));
        save(
            output::save_bird_config(&bird, &family_out.non_mainland, family_out.family, &flavor),
            &bird,
        );

        let china = output_dir.join(china_file(family_out.family));
        save(
            output::save_mainland_routes(&china, &family_out.mainland, family_out.family),
            &china,
        );
    }

    if let Some(first) = failures.into_iter().next() {
        return Err(first);
    }

    log::info!(
        "done: {} IPv4 + {} IPv6 non-mainland CIDRs, {} IPv4 + {} IPv6 mainland CIDRs",
        out.v4.non_mainland.len(),
        out.v6.non_mainland.len(),
        out.v4.mainland.len(),
        out.v6.mainland.len()
    );
    Ok(())
}

fn log_stats(out: &FamilyOutput) {
    let ClassifyStats {
        total_ranges,
        china_filtered,
        china_saved,
        private_filtered,
        hong_kong_kept,
        macao_kept,
        taiwan_kept,
        other_kept,
    } = out.stats;

    if total_ranges == 0 {
        log::info!("{}: no ranges", out.family);
        return;
    }

    log::info!(
        "{}: {} ranges; mainland {} (saved {}), reserved {}, HK {}, MO {}, TW {}, other {}",
        out.family,
        total_ranges,
        china_filtered,
        china_saved,
        private_filtered,
        hong_kong_kept,
        macao_kept,
        taiwan_kept,
        other_kept
    );
}

fn bird_file(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::V4 => "bird_v4.conf",
        AddressFamily::V6 => "bird_v6.conf",
    }
}

fn china_file(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::V4 => "chnroute-ipv4.txt",
        AddressFamily::V6 => "chnroute-ipv6.txt",
    }
}

fn check(
    db: &Path,
    output_dir: &Path,
    samples: usize,
    skip_china: bool,
    skip_non_china: bool,
    verbose: bool,
) -> nchnroutes::Result<bool> {
    log::info!("loading database {}", db.display());
    let reader = IpdbReader::open(db)?;
    let validator = Validator::new(&reader, samples);

    let mut checks: Vec<(&str, FileKind)> = Vec::new();
    if !skip_non_china {
        checks.push(("bird_v4.conf", FileKind::NonMainland));
        checks.push(("bird_v6.conf", FileKind::NonMainland));
    }
    if !skip_china {
        checks.push(("chnroute-ipv4.txt", FileKind::Mainland));
        checks.push(("chnroute-ipv6.txt", FileKind::Mainland));
    }

    let mut all_passed = true;
    for (name, kind) in checks {
        let path = output_dir.join(name);
        if !path.exists() {
            log::warn!("{}: missing", path.display());
            all_passed = false;
            continue;
        }

        let report = validator.check_file(&path, kind)?;
        if report.passed() {
            log::info!(
                "{}: OK ({} CIDRs, {} samples, {} unmatched)",
                name,
                report.total_cidrs,
                report.samples_checked,
                report.unmatched
            );
        } else {
            all_passed = false;
            log::error!(
                "{}: FAILED ({} mainland, {} non-mainland, {} reserved out of {} samples)",
                name,
                report.mainland_hits,
                report.non_mainland_hits,
                report.reserved_hits,
                report.samples_checked
            );
            if verbose {
                for example in &report.examples {
                    log::error!("  {}", example);
                }
            }
        }
    }

    if all_passed {
        log::info!("all checks passed");
    } else {
        log::error!("one or more checks failed");
    }
    Ok(all_passed)
}
