use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use dkim_provision::cli::{parse_options, Cli, Command, RunOptions, USAGE};
use dkim_provision::guard::signer_guard::{check_signer, run_delegate, GuardOutcome, SignerSettings};
use dkim_provision::provision::{run, RunOutcome};
use dkim_provision::utils::dkim::RsaKeyGenerator;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dkim_provision=info")),
        )
        .init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let forwarded: Vec<OsString> = args.iter().skip(1).cloned().collect();

    if let GuardOutcome::DelegateTo { entry_point, args } =
        check_signer(&SignerSettings::from_env(), &forwarded)
    {
        info!(delegate = %entry_point.display(), "Rspamd manages DKIM, handing over");
        return match run_delegate(&entry_point, &args) {
            Ok(code) => exit_code(code),
            Err(e) => {
                error!(delegate = %entry_point.display(), error = %e, "could not run delegate");
                ExitCode::from(127)
            }
        };
    }

    let cli = Cli::parse_from(args);
    let options = match parse_options(&cli.options) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprint!("{USAGE}");
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match provision(&cli, options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn provision(cli: &Cli, options: RunOptions) -> anyhow::Result<RunOutcome> {
    let config = cli.config(options);
    info!(
        config_dir = %config.base_dir.display(),
        selector = %config.selector,
        keysize = %config.key_size,
        "provisioning DKIM keys"
    );

    let host = cli.host_domain();
    let accounts = cli.account_domains();
    run(&config, &[&host, &accounts], &RsaKeyGenerator)
        .with_context(|| format!("DKIM provisioning in {} failed", config.base_dir.display()))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
