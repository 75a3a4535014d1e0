//! `strata transform`: the text transformation.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use strata_core::text::{SAMPLE_INPUTS, transform};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Text to transform. Without it, the built-in samples are transformed.
    pub text: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Transformed {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'static str>,
    input: String,
    output: String,
}

fn transformed(args: &TransformArgs) -> Vec<Transformed> {
    if args.text.is_empty() {
        return SAMPLE_INPUTS
            .iter()
            .map(|&(label, input)| Transformed {
                label: Some(label),
                input: input.to_string(),
                output: transform(input),
            })
            .collect();
    }
    let input = args.text.join(" ");
    vec![Transformed {
        label: None,
        output: transform(&input),
        input,
    }]
}

pub fn run_transform(args: &TransformArgs, output: OutputMode) -> Result<()> {
    let results = transformed(args);
    render_mode(
        output,
        &results,
        |rows, w| {
            for row in rows {
                writeln!(w, "{}", row.output)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, "Transform")?;
            for row in rows {
                if let Some(label) = row.label {
                    writeln!(w, "{label}")?;
                }
                pretty_kv(w, "input", &row.input)?;
                pretty_kv(w, "output", &row.output)?;
                writeln!(w)?;
            }
            Ok(())
        },
    )
}
