// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case. Printing happens here and nowhere else.
//
//   train     corpus → checkpoint (Ctrl-C stops after the current step)
//   generate  checkpoint → text, typed out one character at a time
//   predict   checkpoint → one label per input
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, GenerateArgs, PredictArgs, TrainArgs};
use std::{
    io::{self, Write},
    thread,
    time::Duration,
};

use crate::infra::cancel::CancelToken;

#[derive(Parser, Debug)]
#[command(
    name = "tinygpt",
    version,
    about = "Train a small transformer to generate text or classify intents."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Generate(args) => run_generate(args),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.corpus.display());

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrlc()?;

    let use_case = TrainUseCase::new(args.into());
    let report   = use_case.execute(&cancel)?;

    if report.cancelled {
        println!(
            "Training interrupted after {} steps ({:.1}s). Model saved.",
            report.steps_completed,
            report.elapsed.as_secs_f64()
        );
    } else {
        println!(
            "Training complete: {} steps in {:.1}s. Model saved.",
            report.steps_completed,
            report.elapsed.as_secs_f64()
        );
    }
    if let Some(last) = report.last_estimate() {
        match last.validation {
            Some(val) => println!("Final loss: train {:.4}, val {:.4}", last.train, val),
            None => println!("Final loss: train {:.4}", last.train),
        }
    }
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    let mut use_case = GenerateUseCase::new(&args.checkpoint, args.seed)?;
    let text = use_case.generate(&args.prompt, args.length)?;

    print!("{}", args.prompt);
    type_out(&text, Duration::from_millis(args.delay_ms))?;
    println!();
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::classify_use_case::ClassifyUseCase;

    let use_case = ClassifyUseCase::new(&args.checkpoint)?;
    for text in &args.text {
        let p = use_case.predict(text)?;
        println!("{text}\t{}\t{:.3}", p.label, p.confidence);
    }
    Ok(())
}

/// Print `text` a character at a time, like someone typing it.
fn type_out(text: &str, delay: Duration) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for c in text.chars() {
        write!(out, "{c}")?;
        out.flush()?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Ok(())
}
