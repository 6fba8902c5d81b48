// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stocktag — inventory label preview and printing.
//
// Entry point. Initialises logging, loads the add-on configuration and runs
// one label action.

mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use stocktag_core::LabelConfig;
use stocktag_core::error::Result;
use stocktag_core::types::{ItemSnapshot, PrinterSide};
use stocktag_label::RequestContext;

use services::label_service::{LabelResponse, LabelService};

#[derive(Parser, Debug)]
#[command(name = "stocktag", version, about = "Inventory label preview and printing")]
struct Cli {
    /// Add-on options file. Defaults to /data/options.json.
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an item label to a PNG file.
    Preview {
        /// Item snapshot as JSON.
        #[arg(long, value_name = "FILE")]
        item: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
        #[arg(long, value_name = "PATH", default_value = "label.png")]
        out: PathBuf,
    },
    /// Print an item label, writing a preview instead when the printer is unavailable.
    Print {
        #[arg(long, value_name = "FILE")]
        item: PathBuf,
        #[arg(long, default_value_t = 1)]
        copies: i64,
        /// Roll to print on: auto, left or right.
        #[arg(long, default_value = "auto")]
        side: String,
        #[command(flatten)]
        request: RequestArgs,
        #[arg(long, value_name = "PATH", default_value = "label.png")]
        out: PathBuf,
    },
    /// Free-text label without a QR code.
    Quick {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Send to the printer instead of only rendering.
        #[arg(long)]
        print: bool,
        #[arg(long, value_name = "PATH", default_value = "label.png")]
        out: PathBuf,
    },
    /// Report whether the configured printer is reachable.
    Status,
}

/// The request as seen by the web front end, for link building.
#[derive(Args, Debug)]
struct RequestArgs {
    /// Host (and port) the request was addressed to.
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    scheme: Option<String>,
    #[arg(long)]
    forwarded_proto: Option<String>,
    #[arg(long)]
    forwarded_host: Option<String>,
    /// Home Assistant ingress prefix, e.g. /api/hassio_ingress/<token>.
    #[arg(long)]
    ingress_path: Option<String>,
}

impl RequestArgs {
    fn context(&self) -> RequestContext {
        let mut ctx = RequestContext::new();
        if let Some(scheme) = &self.scheme {
            ctx = ctx.with_scheme(scheme.clone());
        }
        if let Some(host) = &self.host {
            ctx = ctx.with_header("host", host.clone());
        }
        if let Some(proto) = &self.forwarded_proto {
            ctx = ctx.with_header("x-forwarded-proto", proto.clone());
        }
        if let Some(host) = &self.forwarded_host {
            ctx = ctx.with_header("x-forwarded-host", host.clone());
        }
        if let Some(path) = &self.ingress_path {
            ctx = ctx.with_header("x-ingress-path", path.clone());
        }
        ctx
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = LabelConfig::load(cli.options.as_deref())?;
    tracing::info!(
        stock = ?config.label_stock,
        printer = config.ipp_host.as_deref().unwrap_or("-"),
        "Stocktag starting"
    );
    let service = LabelService::new(config);

    let (response, out) = match cli.command {
        Command::Preview { item, request, out } => {
            let item = read_item(&item)?;
            return finish(service.preview(item, &request.context()), &out);
        }
        Command::Print {
            item,
            copies,
            side,
            request,
            out,
        } => {
            let item = read_item(&item)?;
            let side = PrinterSide::from_keyword(&side);
            (
                service.print(item, &request.context(), copies, side).await,
                out,
            )
        }
        Command::Quick {
            title,
            description,
            print,
            out,
        } => {
            let response = if print {
                service.quick_print(&title, &description).await
            } else {
                service.quick_preview(&title, &description)
            };
            (response, out)
        }
        Command::Status => {
            let status = service.printer_status().await;
            println!("printer: {}", status.as_str());
            return Ok(ExitCode::SUCCESS);
        }
    };

    finish(response, &out)
}

fn read_item(path: &Path) -> Result<ItemSnapshot> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn finish(response: LabelResponse, out: &Path) -> Result<ExitCode> {
    tracing::debug!(content_type = ?response.content_type(), "label action finished");
    match response {
        LabelResponse::Png { bytes, reason } => {
            std::fs::write(out, &bytes)?;
            match reason {
                Some(reason) => println!(
                    "not printed ({}); preview written to {}",
                    reason.as_str(),
                    out.display()
                ),
                None => println!("preview written to {}", out.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
        LabelResponse::Printed {
            job_id,
            printer_job_id,
            pages,
        } => {
            println!("printed {pages} label(s): job {job_id} (printer job {printer_job_id})");
            Ok(ExitCode::SUCCESS)
        }
        LabelResponse::Error(human) => {
            eprintln!("{}\n{}", human.message, human.suggestion);
            Ok(ExitCode::FAILURE)
        }
    }
}
