// herakles-perf-profiler - version 0.1.0
// Resource-usage profiler with bounded Top-N collection caches
use clap::Parser;
use herakles_perf_profiler::{load_config, ProfilerConfig};

mod cli;
mod commands;
mod handlers;
mod logging;
mod server;
mod state;

use cli::{Args, Commands};
use commands::{
    command_check, command_config, command_generate_testdata, command_replay, show_config,
};
use logging::{effective_level, setup_logging};

/// Merges CLI arguments over the config file and defaults.
///
/// This enforces precedence: CLI (if provided) > config file > default.
fn resolve_config(args: &Args) -> Result<ProfilerConfig, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        ProfilerConfig::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = bind_ip.to_string();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = &args.log_level {
        config.log_level = format!("{:?}", level).to_lowercase();
    }
    if let Some(n) = args.top_n_category {
        config.top_n_stats_per_category = n;
    }
    if let Some(n) = args.top_n_subcategory {
        config.top_n_stats_per_subcategory = n;
    }
    if let Some(n) = args.max_user_switch_events {
        config.max_user_switch_events = n;
    }
    if let Some(n) = args.periodic_buffer_size {
        config.periodic_collection_buffer_size = n;
    }
    if let Some(secs) = args.retention_secs {
        config.system_event_data_cache_duration_secs = secs;
    }
    if let Some(secs) = args.sample_interval_secs {
        config.sample_interval_secs = secs;
    }
    if args.sync_resource_usage {
        config.sync_resource_usage_stats = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    // Early exit for show/check modes
    if args.check_config {
        if let Err(e) = config.validate() {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        return Ok(());
    }
    if args.show_config {
        return show_config(&config, args.config_format);
    }

    setup_logging(&effective_level(args.log_level.as_ref(), &config.log_level))?;

    // Handle subcommands
    if let Some(command) = args.command {
        return match command {
            Commands::Check { replay } => command_check(replay.as_deref(), &config),
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output, format, commented),
            Commands::GenerateTestdata {
                output,
                samples,
                uids,
                processes_per_uid,
            } => command_generate_testdata(output, samples, uids, processes_per_uid),
            Commands::Replay {
                file,
                proto_output,
                packages,
                user_switch,
            } => command_replay(file, proto_output, packages, user_switch, &config),
        };
    }

    if let Err(e) = config.validate() {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    server::run_server(config, args.replay_file.as_deref()).await
}
