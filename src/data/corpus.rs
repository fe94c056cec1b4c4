// ============================================================
// Layer 4 — Annotation Corpus Reader
// ============================================================
// Reads the two parallel annotation streams and joins them into
// one CaptionRecord per image.
//
// Line format (one caption per line):
//
//   1000268201_693b08cb0e.jpg#0\tA child in a pink dress ...
//   └────── identifier ─────┘└ext┘└n┘  └──── caption ────┘
//
// The "#n" variant suffix is optional. Blank lines are skipped.
// Anything else that does not match is rejected with the stream
// name and 1-based line number so the bad file can be fixed.
//
// Join rules:
//   - records appear in order of first sighting (primary first)
//   - within a record, primary captions precede alternates
//   - an image seen in only one stream is kept
//
// Reference: Rust Book §8 (HashMap), §9 (Error Handling)

use std::collections::HashMap;
use std::io::BufRead;

use anyhow::{Context, Result};

use crate::domain::caption_record::CaptionRecord;
use crate::domain::error::{CaptionError, CaptionResult};

/// One parsed annotation line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLine {
    pub image_id: String,
    pub caption:  String,
}

/// Parse `"<id>.<ext>[#n]\t<caption>"`.
pub fn parse_annotation_line(line: &str) -> CaptionResult<AnnotationLine> {
    let (key, caption) = line
        .split_once('\t')
        .ok_or_else(|| CaptionError::InvalidInput("missing tab separator".into()))?;

    // Drop the "#n" variant suffix, then the file extension
    let file = key.split_once('#').map_or(key, |(f, _)| f).trim();
    let image_id = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    if image_id.is_empty() {
        return Err(CaptionError::InvalidInput("empty image identifier".into()));
    }

    let caption = caption.trim();
    if caption.is_empty() {
        return Err(CaptionError::InvalidInput(format!(
            "empty caption for image '{image_id}'"
        )));
    }

    Ok(AnnotationLine {
        image_id: image_id.to_string(),
        caption:  caption.to_string(),
    })
}

/// Parse every non-blank line of one stream.
pub fn read_annotations<R: BufRead>(reader: R, stream: &str) -> Result<Vec<AnnotationLine>> {
    let mut lines = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read line {} of {stream}", n + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_annotation_line(&line)
            .with_context(|| format!("{stream}:{}: malformed annotation", n + 1))?;
        lines.push(parsed);
    }
    Ok(lines)
}

/// Join primary captions with an optional alternate stream.
pub fn join_annotation_streams<P, A>(primary: P, alternates: Option<A>) -> Result<Vec<CaptionRecord>>
where
    P: BufRead,
    A: BufRead,
{
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    let mut add = |lines: Vec<AnnotationLine>| {
        for AnnotationLine { image_id, caption } in lines {
            grouped
                .entry(image_id)
                .or_insert_with_key(|id| {
                    order.push(id.clone());
                    Vec::new()
                })
                .push(caption);
        }
    };

    add(read_annotations(primary, "primary captions")?);
    if let Some(alt) = alternates {
        add(read_annotations(alt, "alternate captions")?);
    }

    let records = order
        .into_iter()
        .map(|id| {
            let captions = grouped.remove(&id).unwrap_or_default();
            CaptionRecord::new(id, captions)
        })
        .collect::<CaptionResult<Vec<_>>>()?;

    tracing::info!(
        "Joined {} images with {} captions",
        records.len(),
        records.iter().map(CaptionRecord::variant_count).sum::<usize>()
    );
    Ok(records)
}

/// All caption strings of all records, in record order.
pub fn corpus_texts(records: &[CaptionRecord]) -> impl Iterator<Item = &str> {
    records
        .iter()
        .flat_map(|r| r.captions().iter().map(String::as_str))
}
