//! `strata profile`: the entity profile stored next to the browser layer.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use strata_core::profile::{self, EntityProfile, ProfileError, ProfileSource, ProfileUpdate};
use tracing::warn;

use super::Host;
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the stored profile, generating a random one on first use.
    Show,

    /// Replace the stored profile with a freshly generated one.
    Random {
        /// Seed for the generated name.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Edit the stored profile.
    #[command(
        after_help = "EXAMPLES:\n    # Rename\n    strata profile update --namespace Holmes --other-names \"Sherlock Scott\"\n\n    # Attach a picture with credits\n    strata profile update --namespace Holmes --image portrait.png --credits \"S. Paget\""
    )]
    Update(ProfileUpdateArgs),
}

#[derive(Args, Debug)]
pub struct ProfileUpdateArgs {
    /// Base name (e.g. a family name).
    #[arg(long, default_value = "")]
    pub namespace: String,

    /// Other names, separated by whitespace.
    #[arg(long, default_value = "")]
    pub other_names: String,

    /// Image file to attach as the representative image.
    #[arg(long)]
    pub image: Option<PathBuf>,

    #[arg(long, default_value = "")]
    pub caption: String,

    #[arg(long, default_value = "")]
    pub credits: String,
}

#[derive(Debug, Serialize)]
struct ProfileReport<'a> {
    profile_name: &'a str,
    source: ProfileSource,
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    entity: &'a EntityProfile,
}

pub fn run_profile(args: &ProfileArgs, output: OutputMode, host: &mut Host) -> Result<()> {
    let key = host.config.profile_key();
    let seed = match args.command {
        ProfileCommand::Random { seed } => seed,
        _ => None,
    };
    let mut entropy = super::entropy(seed);
    let failed = |err: ProfileError| fail(output, err.code(), err.to_string());

    match &args.command {
        ProfileCommand::Show => {
            let (entity, source) =
                profile::load_or_create(&mut host.store, &key, &mut *entropy).map_err(failed)?;
            render(output, &host.profile, &entity, source, None)
        }
        ProfileCommand::Random { .. } => {
            let entity = EntityProfile::random(&mut *entropy);
            profile::save(&mut host.store, &key, &entity).map_err(failed)?;
            render(output, &host.profile, &entity, ProfileSource::Generated, None)
        }
        ProfileCommand::Update(update_args) => {
            let image = update_args
                .image
                .as_ref()
                .map(|path| {
                    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
                })
                .transpose()?;
            let (mut entity, source) =
                profile::load_or_create(&mut host.store, &key, &mut *entropy).map_err(failed)?;
            let warning = entity.apply_update(&ProfileUpdate {
                namespace: &update_args.namespace,
                other_names: &update_args.other_names,
                image: image.as_deref(),
                caption: &update_args.caption,
                credits: &update_args.credits,
            });
            if let Some(warning) = warning {
                warn!(%warning, "profile update partially applied");
            }
            profile::save(&mut host.store, &key, &entity).map_err(failed)?;
            render(
                output,
                &host.profile,
                &entity,
                source,
                warning.map(|w| w.to_string()),
            )
        }
    }
}

fn render(
    output: OutputMode,
    profile_name: &str,
    entity: &EntityProfile,
    source: ProfileSource,
    warning: Option<String>,
) -> Result<()> {
    let report = ProfileReport {
        profile_name,
        source,
        display_name: entity.display_name(),
        warning,
        entity,
    };
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "entity_id\t{}", r.entity.entity_id)?;
            writeln!(w, "name\t{}", r.display_name.as_deref().unwrap_or("-"))?;
            if let Some(warning) = &r.warning {
                writeln!(w, "warning\t{warning}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Profile '{}'", r.profile_name))?;
            pretty_kv(w, "entity", &r.entity.entity_id)?;
            pretty_kv(w, "name", r.display_name.as_deref().unwrap_or("(unnamed)"))?;
            let source = match r.source {
                ProfileSource::Stored => "browser storage",
                ProfileSource::Generated => "generated",
            };
            pretty_kv(w, "source", source)?;
            match &r.entity.representative_image {
                Some(image) => {
                    pretty_kv(w, "image", format!("{} bytes (base64)", image.data.len()))?;
                    pretty_kv(w, "caption", &image.caption)?;
                    pretty_kv(w, "credits", &image.credits)?;
                }
                None => pretty_kv(w, "image", "(none)")?,
            }
            if let Some(warning) = &r.warning {
                writeln!(w, "\nwarning: {warning}")?;
            }
            Ok(())
        },
    )
}
