//! Clip creation.
//!
//! Validates a request, runs the extraction job, and registers the result.
//! Every failure aborts before the registry is touched, so clients never see
//! a record for a clip that was not fully written.

use chrono::{DateTime, Duration, Utc};

use clipshare_core::{ClipRecord, ClipToken, Error, ExtractionRequest, Result};

use crate::context::AppContext;

/// Fresh tokens to try when a generated one is already taken.
const TOKEN_ATTEMPTS: usize = 3;

/// A registered clip and the link that serves it.
#[derive(Debug, Clone)]
pub struct CreatedClip {
    pub record: ClipRecord,
    pub url: String,
}

/// Run one creation request end to end.
///
/// `base_url` is the externally visible origin the delivery URL is built on,
/// e.g. `https://media.example.com`.
pub async fn create_clip(
    ctx: &AppContext,
    request: &ExtractionRequest,
    base_url: &str,
) -> Result<CreatedClip> {
    request.validate()?;
    request.check_source()?;

    let hours = request.expire_hours(ctx.config.clips.default_expire_hours);
    let lifetime = Duration::try_hours(hours)
        .ok_or_else(|| Error::Validation(format!("expiry of {hours} hours is out of range")))?;
    expiry_after(ctx.clock.now(), lifetime)?;

    ctx.work_dir.ensure_writable()?;

    let (token, output_path) = fresh_token(ctx)?;

    ctx.extractor
        .run(
            &request.source_path,
            request.start_seconds,
            request.end_seconds,
            &output_path,
        )
        .await?;

    let created_at = ctx.clock.now();
    let record = ClipRecord {
        token,
        output_path,
        created_at,
        expires_at: expiry_after(created_at, lifetime)?,
    };

    if let Err(e) = ctx.registry.insert(record.clone()) {
        // The path was unused when the token was picked; the file is ours.
        if let Err(rm) = std::fs::remove_file(&record.output_path) {
            tracing::warn!(path = %record.output_path.display(), "Failed to remove unregistered clip: {rm}");
        }
        return Err(e);
    }

    let url = clip_url(base_url, &record.token);
    tracing::info!(
        token = %record.token,
        source = %request.source_path.display(),
        expires_at = %record.expires_at,
        "Clip created"
    );

    Ok(CreatedClip { record, url })
}

/// Public delivery URL for `token` under `base_url`.
pub fn clip_url(base_url: &str, token: &ClipToken) -> String {
    format!("{}/clip/{token}", base_url.trim_end_matches('/'))
}

fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(lifetime)
        .ok_or_else(|| Error::Validation("clip expiry is out of range".into()))
}

/// Pick a token whose output path is free and that is not registered.
fn fresh_token(ctx: &AppContext) -> Result<(ClipToken, std::path::PathBuf)> {
    let clips = &ctx.config.clips;
    for _ in 0..TOKEN_ATTEMPTS {
        let token = ClipToken::generate_with_len(clips.token_bytes);
        let path = ctx.work_dir.clip_path(&token, &clips.output_extension);
        if !path.exists() && ctx.registry.lookup(&token).is_none() {
            return Ok((token, path));
        }
        tracing::warn!(token = %token, "Generated clip token is already in use; retrying");
    }
    Err(Error::Conflict(
        "could not allocate an unused clip token".into(),
    ))
}
