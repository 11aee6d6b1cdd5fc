use tracing::debug;

use crate::translate::{TranslateRequest, TranslatorInterface};
use crate::utils::chunker::split_into_chunks;
use crate::utils::reassembler::reassemble_lines;
use super::job::JobId;
use super::store::{JobParams, JobStore};

/// Translate `text` chunk by chunk, reporting progress into `store`.
///
/// The job's status is checked before every chunk; once it is no longer
/// `running` the loop stops and `Ok(None)` is returned. A chunk already
/// handed to the translator is allowed to finish.
pub async fn translate_with_progress(
    store: &JobStore,
    translator: &dyn TranslatorInterface,
    id: &JobId,
    text: &str,
    params: &JobParams,
    max_chunk_chars: usize,
) -> anyhow::Result<Option<String>> {
    let plan = split_into_chunks(text, max_chunk_chars);
    let total = plan.len();
    store.set_total_units(id, total);
    debug!(job_id = %id, chunks = total, lines = plan.line_count, "Split job text");

    let mut translated = Vec::with_capacity(total);
    for (idx, chunk) in plan.chunks.iter().enumerate() {
        if store.should_stop(id) {
            debug!(job_id = %id, done = idx, total, "Stopping at chunk boundary");
            return Ok(None);
        }

        let output = if chunk.text.trim().is_empty() {
            String::new()
        } else {
            let request = TranslateRequest::new(
                chunk.text.as_str(),
                params.source_lang.as_str(),
                params.target_lang.as_str(),
                params.generate.clone(),
            );
            translator.translate(&request).await?
        };

        translated.push(output);
        store.record_progress(id, idx + 1, total);
    }

    let pairs = translated.iter().zip(plan.line_indices());
    Ok(Some(reassemble_lines(pairs, plan.line_count)))
}
