use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use exscript::{Compiler, EchoConnection, Value};

const USAGE: &str = "usage: exscript [--check] [-d NAME=VALUE]... SCRIPT";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut check_only = false;
    let mut defines = Vec::new();
    let mut script: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--check" => check_only = true,
            "-d" | "--define" => {
                let spec = args
                    .next()
                    .with_context(|| format!("{arg} requires NAME=VALUE"))?;
                let (name, value) = spec
                    .split_once('=')
                    .with_context(|| format!("{arg} requires NAME=VALUE, got '{spec}'"))?;
                defines.push((name.to_string(), value.to_string()));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if arg.starts_with('-') => bail!("unknown option '{arg}'\n{USAGE}"),
            _ => {
                if script.is_some() {
                    bail!("only one script may be given\n{USAGE}");
                }
                script = Some(arg);
            }
        }
    }
    let Some(script) = script else {
        bail!("{USAGE}");
    };

    let source =
        fs::read_to_string(&script).with_context(|| format!("cannot read '{script}'"))?;
    let mut compiler = Compiler::new();
    for (name, value) in defines {
        compiler.define(name, Value::text(value));
    }
    let program = compiler
        .compile(&source)
        .map_err(|err| anyhow::anyhow!("{script}: {err}"))?;
    if check_only {
        return Ok(());
    }

    // Without a device the script runs against the echo connection, which
    // answers every command with itself.
    let mut conn = EchoConnection::new();
    let execution = program
        .execute(&mut conn)
        .map_err(|err| anyhow::anyhow!("{script}: {err}"))?;
    for message in &execution.messages {
        eprintln!("{message}");
    }
    for response in &execution.output {
        println!("{response}");
    }
    Ok(())
}
