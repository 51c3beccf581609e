//! Digester CLI - pins Kubernetes container images to digests

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod logging;

use commands::function::FunctionOptions;
use commands::webhook::WebhookOptions;
use logging::LogTarget;

#[derive(Parser)]
#[command(name = "digester")]
#[command(version)]
#[command(about = "Resolve container image tags to digests", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true, env = "DEBUG")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mutating admission webhook
    Webhook {
        /// Directory holding tls.crt and tls.key
        #[arg(long, default_value = "/certs")]
        cert_dir: PathBuf,

        /// Webhook HTTPS port
        #[arg(long, default_value_t = 8443)]
        port: u16,

        /// Plain HTTP address for the health probes
        #[arg(long, default_value = ":9090")]
        health_addr: String,

        /// Review objects without patching them
        #[arg(long)]
        dry_run: bool,

        /// Do not look up pull secrets in the cluster
        #[arg(long, env = "OFFLINE")]
        offline: bool,

        /// Admit objects unchanged when resolution fails
        #[arg(long)]
        ignore_errors: bool,

        /// Colon or semicolon separated image prefixes left untouched
        #[arg(long, env = "SKIP_PREFIXES")]
        skip_prefixes: Option<String>,

        /// Platform for multi-platform images, e.g. linux/arm64
        #[arg(long, env = "PLATFORM")]
        platform: Option<String>,

        /// Kubeconfig list; the first entry is used, in-cluster config when unset
        #[arg(long, env = "KUBECONFIG")]
        kubeconfig: Option<String>,

        /// Per-request resolution timeout, 0 disables it
        #[arg(long, default_value_t = 10)]
        timeout_seconds: u64,

        /// Namespace the webhook runs in; its objects are never mutated
        #[arg(long, env = "POD_NAMESPACE", default_value = digester_core::DEFAULT_OPERATING_NAMESPACE)]
        namespace: String,
    },

    /// Pin images in a ResourceList or YAML stream (stdin to stdout)
    Function {
        /// Input file (reads stdin when omitted)
        input: Option<PathBuf>,

        /// Do not look up pull secrets in the cluster
        #[arg(long, env = "OFFLINE", default_value_t = true, action = ArgAction::Set)]
        offline: bool,

        /// Kubeconfig list; the first entry is used
        #[arg(long, env = "KUBECONFIG")]
        kubeconfig: Option<String>,

        /// Colon or semicolon separated image prefixes left untouched
        #[arg(long, env = "SKIP_PREFIXES")]
        skip_prefixes: Option<String>,

        /// Platform for multi-platform images, e.g. linux/arm64
        #[arg(long, env = "PLATFORM")]
        platform: Option<String>,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let target = if matches!(cli.command, Commands::Function { .. }) {
        LogTarget::Stderr
    } else {
        LogTarget::Stdout
    };
    logging::init(cli.debug, target);

    let result = match cli.command {
        Commands::Webhook {
            cert_dir,
            port,
            health_addr,
            dry_run,
            offline,
            ignore_errors,
            skip_prefixes,
            platform,
            kubeconfig,
            timeout_seconds,
            namespace,
        } => {
            commands::webhook::run(WebhookOptions {
                cert_dir,
                port,
                health_addr,
                dry_run,
                offline,
                ignore_errors,
                skip_prefixes,
                platform,
                kubeconfig,
                timeout_seconds,
                namespace,
            })
            .await
        }

        Commands::Function {
            input,
            offline,
            kubeconfig,
            skip_prefixes,
            platform,
        } => {
            commands::function::run(FunctionOptions {
                input,
                offline,
                kubeconfig,
                skip_prefixes,
                platform,
            })
            .await
        }

        Commands::Version => commands::version::run(),
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
