//! The `run` command: one pruning pass over every managed list.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use listprune_config::{list, BotConfig, ListConfig};
use listprune_core::{CoreError, PruneResult, Pruner};
use listprune_directory::ReplicaDirectory;
use listprune_site::{bots, EditRequest, ListPage, Site, SiteError};

struct RunContext<'a> {
    config: &'a BotConfig,
    pruner: Pruner,
    site: Site,
    formats: HashMap<String, String>,
    template: regex::Regex,
    dry_run: bool,
}

pub async fn handle(config: &BotConfig, dry_run: bool) -> Result<()> {
    let directory = ReplicaDirectory::connect(&config.database_url)
        .await
        .context("failed to open the replica pool")?;
    let pruner = Pruner::new(Arc::new(directory));

    let site = Site::new(&config.api_url)?;
    site.login(&config.username, &config.password)
        .await
        .context("login failed")?;

    let formats_json = site
        .fetch_content_by_id(config.formats_page_id)
        .await
        .context("failed to fetch the formats page")?;
    let formats: HashMap<String, String> =
        serde_json::from_str(&formats_json).context("formats page is not a JSON map")?;

    let template = list::template_regex(&config.config_template)?;

    let ctx = RunContext {
        config,
        pruner,
        site,
        formats,
        template,
        dry_run,
    };

    let template_title = format!("Template:{}", config.config_template);
    for page in ctx.site.pages_embedding(&template_title).await? {
        info!(title = %page.title, "processing page");
        process_page(&ctx, page).await?;
    }

    Ok(())
}

/// Process one managed page. Per-page configuration problems are logged and
/// skipped; lookup failures and unexpected API errors abort the whole run.
async fn process_page(ctx: &RunContext<'_>, mut page: ListPage) -> Result<()> {
    if page.content_model != "wikitext" {
        warn!(title = %page.title, model = %page.content_model, "unsupported content model, skipping");
        return Ok(());
    }

    let mut retried = false;
    loop {
        let now = OffsetDateTime::now_utc();

        let list_config = match ListConfig::parse(&page.content, &ctx.template, now) {
            Ok(config) => config,
            Err(error) => {
                warn!(title = %page.title, %error, "invalid list configuration, skipping");
                return Ok(());
            }
        };

        let Some(pattern) = ctx.formats.get(&list_config.format) else {
            warn!(title = %page.title, format = %list_config.format, "unknown format, skipping");
            return Ok(());
        };

        let result = match ctx
            .pruner
            .prune(
                &page.content,
                pattern,
                list_config.inactivity_cutoff,
                list_config.block_cutoff,
            )
            .await
        {
            Ok(result) => result,
            // pattern misconfiguration abandons this list, not the run
            Err(
                error @ (CoreError::CaptureGroupCount { .. }
                | CoreError::CaptureGroupAtStart(_)
                | CoreError::Pattern(_)),
            ) => {
                warn!(title = %page.title, %error, "unusable extraction pattern, skipping");
                return Ok(());
            }
            // lookup failures and deriver invariant violations stop the run;
            // nothing else gets written
            Err(error) => return Err(error.into()),
        };

        if result.text == page.content {
            debug!(title = %page.title, "no change, skipping write");
            return Ok(());
        }

        let summary = edit_summary(&result);
        if ctx.dry_run {
            info!(title = %page.title, %summary, "dry run, not editing");
            return Ok(());
        }

        let edit = EditRequest {
            title: page.title.clone(),
            text: result.text.clone(),
            summary,
            base_timestamp: Some(page.rev_timestamp.clone()),
            start_timestamp: Some(page.cur_timestamp.clone()),
            ..Default::default()
        };

        match ctx.site.edit(&edit).await {
            Ok(()) => {
                info!(title = %page.title, "pruned, starting notifications");
                notify_removed(ctx, &page.title, &list_config, &result).await?;
                return Ok(());
            }
            Err(SiteError::EditConflict) if !retried => {
                info!(title = %page.title, "edit conflict, refetching");
                page = ctx.site.fetch_page(&page.title).await?;
                retried = true;
            }
            Err(SiteError::EditConflict) => {
                warn!(title = %page.title, "edit conflicted twice, skipping");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Leave a talk-page note for each identifier removed for inactivity,
/// honoring the per-list message template and the `{{bots}}` opt-out.
async fn notify_removed(
    ctx: &RunContext<'_>,
    page_title: &str,
    list_config: &ListConfig,
    result: &PruneResult,
) -> Result<()> {
    let message_template = list_config
        .parameters
        .get("expiredmsg")
        .filter(|value| !value.is_empty())
        .unwrap_or(&ctx.config.expired_message_template);
    if message_template == "none" {
        return Ok(());
    }

    let header = list_config
        .parameters
        .get("talkmsgheader")
        .filter(|value| !value.is_empty())
        .unwrap_or(&ctx.config.talk_message_header);
    let inactivity = list_config
        .parameters
        .get("inactivity")
        .map(String::as_str)
        .unwrap_or_default();

    for identifier in &result.removed_inactive {
        let talk_title = format!("User talk:{}", identifier);

        let existing = match ctx.site.fetch_page(&talk_title).await {
            Ok(page) => page.content,
            Err(error) => {
                warn!(%identifier, %error, "could not fetch talk page, skipping notification");
                continue;
            }
        };
        if !bots::bot_allowed(&existing, &ctx.config.username) {
            debug!(%identifier, "bot excluded from talk page, skipping notification");
            continue;
        }

        let text = format!(
            "{{{{subst:{}|{}|{}|{}}}}} ~~~~",
            message_template, identifier, page_title, inactivity
        );
        let edit = EditRequest {
            title: talk_title,
            text,
            summary: format!("Pruner: {}", header),
            new_section_title: Some(header.clone()),
            follow_redirects: true,
            ..Default::default()
        };

        match ctx.site.edit(&edit).await {
            Ok(()) => {
                info!(%identifier, "notified of removal from {}", page_title);
                // pace the talk-page edits
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            Err(SiteError::Api { code, info }) => {
                // these mean the bot itself may be blocked; stop writing
                if matches!(code.as_str(), "noedit" | "writeapidenied" | "blocked") {
                    bail!("notification edit denied ({code}): {info}");
                }
                warn!(%identifier, %code, %info, "could not notify");
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}

/// Assemble the edit summary from the pass counts.
fn edit_summary(result: &PruneResult) -> String {
    let mut actions = Vec::new();
    if result.inactive_count() != 0 {
        actions.push(format!("{} inactive user(s)", result.inactive_count()));
    }
    if result.indeffed_count() != 0 {
        actions.push(format!("{} indeffed user(s)", result.indeffed_count()));
    }
    if result.rename_count() != 0 {
        actions.push(format!("{} renamed user(s)", result.rename_count()));
    }
    format!(
        "Pruning users as configured on page: processed {}",
        actions.join("; ")
    )
}
