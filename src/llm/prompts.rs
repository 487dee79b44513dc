//! Default prompt templates for page entity extraction.

/// Prompt for text-mode extraction. `{page_text}` is replaced with the
/// OCR text of one logical page.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are indexing a skateboarding magazine archive. The text below is OCR output from one page of a magazine, so expect garbled characters and broken words.

Identify every named entity on the page and return ONLY a JSON object with this exact structure:

{
  "skaters": [{"name": "Tony Hawk", "context": "interview"}],
  "spots": [{"name": "EMB", "city": "San Francisco", "state": "CA", "type": "plaza", "address": null}],
  "photographers": [{"name": "Grant Brittain"}],
  "brands": [{"name": "Powell Peralta", "category": "decks", "context": "ad"}],
  "tricks": [{"name": "kickflip backside tailslide", "performedBy": "Tony Hawk", "location": "EMB"}],
  "events": [{"name": "Tampa Pro", "date": "1995", "location": "Tampa"}],
  "locations": [{"name": "San Francisco", "type": "city", "city": null, "state": "CA", "country": "USA"}]
}

Rules:
- "context" must be one of: cover, feature, interview, photo, ad, contest_results, mention, other
- Use null for any field you cannot determine; never invent values
- Use an empty array for entity types with no matches on this page
- Skip entities whose names are too garbled to read confidently
- Return ONLY the JSON object with no commentary and no markdown fences

Page text:
{page_text}"#;

/// Prompt for vision-mode extraction. Sent alongside the base64-encoded
/// page image; no OCR text placeholder.
pub const DEFAULT_VISION_PROMPT: &str = r#"You are indexing a skateboarding magazine archive. The attached image is a scan of one page of a magazine.

Identify every named entity visible on the page (headlines, captions, photo credits, ads) and return ONLY a JSON object with this exact structure:

{
  "skaters": [{"name": "Tony Hawk", "context": "interview"}],
  "spots": [{"name": "EMB", "city": "San Francisco", "state": "CA", "type": "plaza", "address": null}],
  "photographers": [{"name": "Grant Brittain"}],
  "brands": [{"name": "Powell Peralta", "category": "decks", "context": "ad"}],
  "tricks": [{"name": "kickflip backside tailslide", "performedBy": "Tony Hawk", "location": "EMB"}],
  "events": [{"name": "Tampa Pro", "date": "1995", "location": "Tampa"}],
  "locations": [{"name": "San Francisco", "type": "city", "city": null, "state": "CA", "country": "USA"}]
}

Rules:
- "context" must be one of: cover, feature, interview, photo, ad, contest_results, mention, other
- Use null for any field you cannot determine; never invent values
- Use an empty array for entity types with no matches on this page
- Return ONLY the JSON object with no commentary and no markdown fences"#;
