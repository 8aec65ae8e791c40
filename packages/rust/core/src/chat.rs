//! Question answering: retrieval-augmented chat and the FAQ-only ask flow.

use tracing::{debug, instrument, warn};

use faqbot_shared::{ChunkMatch, FaqBotError, Result};

use crate::context::AppContext;
use crate::openai::OpenAiClient;
use crate::prompt::{ask_messages, chat_messages, faq_context, website_context};

/// Reply used by the ask flow when the model returns nothing.
pub const ASK_FALLBACK_REPLY: &str = "I don't know.";

/// Answer a visitor's question from the tenant's FAQs and indexed website.
///
/// FAQ loading and vector search are best effort: failures are logged and
/// the prompt falls back to its placeholders. Only the completion call is
/// allowed to fail the request.
#[instrument(skip_all, fields(tenant_id = %tenant_id.trim()))]
pub async fn answer(ctx: &AppContext, tenant_id: &str, question: &str) -> Result<String> {
    let question = question.trim();
    let tenant_id = tenant_id.trim();

    if question.is_empty() {
        return Err(FaqBotError::validation("Please provide a question."));
    }
    if tenant_id.is_empty() {
        return Err(FaqBotError::validation("Missing tenantId."));
    }

    let openai = ctx.openai()?;

    let faqs = match ctx.storage.list_faqs(tenant_id, None).await {
        Ok(faqs) => faqs,
        Err(e) => {
            warn!(error = %e, "failed to load FAQs");
            Vec::new()
        }
    };

    let website = match search_website(ctx, openai, tenant_id, question).await {
        Ok(matches) => website_context(&matches),
        Err(e) => {
            warn!(error = %e, "vector search skipped");
            String::new()
        }
    };

    debug!(faqs = faqs.len(), website_chars = website.len(), "prompt assembled");
    let messages = chat_messages(question, &faq_context(&faqs), &website);
    openai.complete(&messages).await
}

async fn search_website(
    ctx: &AppContext,
    openai: &OpenAiClient,
    tenant_id: &str,
    question: &str,
) -> Result<Vec<ChunkMatch>> {
    let embedding = openai.embed_one(question).await?;
    ctx.storage
        .match_page_chunks(tenant_id, &embedding, ctx.config.chat.match_count)
        .await
}

/// Answer strictly from the tenant's most recent FAQs.
#[instrument(skip_all, fields(tenant_id = %tenant_id.trim()))]
pub async fn ask(ctx: &AppContext, tenant_id: &str, question: &str) -> Result<String> {
    let question = question.trim();
    let tenant_id = tenant_id.trim();

    if question.is_empty() {
        return Err(FaqBotError::validation("Missing question"));
    }
    if tenant_id.is_empty() {
        return Err(FaqBotError::validation("Missing tenantId"));
    }

    let openai = ctx.openai()?;
    let faqs = ctx
        .storage
        .list_faqs(tenant_id, Some(ctx.config.chat.ask_faq_limit))
        .await?;

    let reply = openai.complete(&ask_messages(question, &faqs)).await?;
    if reply.is_empty() {
        return Ok(ASK_FALLBACK_REPLY.to_string());
    }
    Ok(reply)
}
