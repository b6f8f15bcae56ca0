mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::{CompilerOptions, RenderMode};
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Debug,
}

pub struct EnhancedCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"));

        match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("analyze", sub_matches)) => handlers::handle_analyze_command(sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.json or .toml)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile an .ets file to JavaScript")
                    .arg(Arg::new("input").help("Input .ets file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output .js file"))
                    .arg(Arg::new("mode").short('m').long("mode").value_parser(clap::value_parser!(Mode)).help("Target runtime (default: partial)"))
                    .arg(Arg::new("route").long("route").value_name("NAME").help("Named route for the @Entry component"))
                    .arg(Arg::new("page-path").long("page-path").value_name("PATH").help("Page path recorded with the route"))
                    .arg(Arg::new("bundle").long("bundle").value_name("NAME").help("Bundle name recorded with the route"))
                    .arg(Arg::new("module").long("module").value_name("NAME").help("Module name recorded with the route"))
                    .arg(Arg::new("allow-partial").long("allow-partial").help("Write output even when some declarations were rejected").action(ArgAction::SetTrue))
                    .arg(Arg::new("no-source-position").long("no-source-position").help("Omit { page, line, col } from child constructors").action(ArgAction::SetTrue))
                    .arg(Arg::new("debug").short('d').long("debug").help("Enable debug mode with extra logging").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show detailed compilation statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("watch").short('w').long("watch").help("Watch for file changes and recompile").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Check .ets files for syntax and structural errors")
                    .arg(Arg::new("input").help("Input .ets file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all .ets files in directory recursively").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("analyze")
                    .about("Show how each component's fields are classified")
                    .arg(Arg::new("input").help("Input .ets file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output analysis to file"))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(OutputFormat)).default_value("debug").help("Analysis output format")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    /// Options from the config file, overridden by whatever the command line sets.
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions::default();
        if let Some(mode) = self.config.mode {
            options.mode = mode;
        }
        if let Some(mode) = matches.get_one::<Mode>("mode") {
            options.mode = match mode {
                Mode::Partial => RenderMode::Partial,
                Mode::Full => RenderMode::Full,
            };
        }

        options.page_path = matches
            .get_one::<String>("page-path")
            .cloned()
            .or_else(|| self.config.page_path.clone());
        options.route_name = matches
            .get_one::<String>("route")
            .cloned()
            .or_else(|| self.config.route_name.clone());
        if let Some(route) = &options.route_name {
            if route.trim().is_empty() {
                return Err(CompilerError::InvalidFormat {
                    message: "Route name cannot be empty".to_string(),
                });
            }
        }
        options.bundle_name = matches
            .get_one::<String>("bundle")
            .cloned()
            .or_else(|| self.config.bundle_name.clone())
            .unwrap_or_default();
        options.module_name = matches
            .get_one::<String>("module")
            .cloned()
            .or_else(|| self.config.module_name.clone())
            .unwrap_or_default();

        options.debug_mode = matches.get_flag("debug");
        options.allow_partial =
            matches.get_flag("allow-partial") || self.config.allow_partial.unwrap_or(false);
        options.emit_source_position = !matches.get_flag("no-source-position")
            && self.config.emit_source_position.unwrap_or(true);
        if let Some(max_size) = self.config.max_file_size {
            options.max_file_size = max_size;
        }
        Ok(options)
    }

    /// Options for commands that take no compile flags.
    pub fn config_options(&self) -> CompilerOptions {
        CompilerOptions {
            mode: self.config.mode.unwrap_or_default(),
            allow_partial: true,
            max_file_size: self.config.max_file_size.unwrap_or(0),
            ..CompilerOptions::default()
        }
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }
}
