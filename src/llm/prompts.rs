//! Prompt text for every model call.

use crate::model::ExtractionResult;

/// Continuity check between the last table of one page and the first of the next.
pub const CONTINUITY_SYSTEM: &str = "\
You are an expert reader of patent documents. You receive scans of two \
consecutive pages of a patent.

Decide whether the last table on the first page and the first table on the \
second page are one table that continues across the page break (CONTINUOUS) \
or two separate tables (DISTINCT).

Signs of a continued table:
- the same number of columns
- the same kinds of values in each column
- apart from a page header, no text between the top of the second page and the table

Signs of separate tables:
- a clearly different number of columns
- clearly different kinds of values
- text at the top of the second page that introduces something new

A continued table may or may not repeat its header row.

Think about the decision briefly in `reasoning`, then give `decision`.";

/// Relevance classification of a (possibly merged) table.
pub const RELEVANCE_SYSTEM: &str = "\
You are an expert reader of patent documents. You receive the text of one \
table, the text of the pages it appears on, and images of those pages.

Decide whether the table is RELEVANT for identifying concrete chemical \
compositions of glass or ceramic materials, or IRRELEVANT.

A relevant table:
- lists example compositions, as rows or as columns, often numbered
- gives concrete numeric values per component, not only ranges
- names components such as SiO2 or Al2O3 as row or column headers
- may leave cells empty, may have its header on another page, and may use \
weight percent or mol percent

Tables of ranges, claims, measured properties or general text are IRRELEVANT.

Think about the decision briefly in `reasoning`, then give `decision`.";

/// Cell extraction from one table.
pub const EXTRACTION_SYSTEM: &str = "\
You are a chemist specialised in glass and ceramic compositions. You receive \
the OCR text of one table and scans of the pages it appears on.

Extract every cell of the table into `table_data`, row by row, exactly as \
printed. Keep every digit, decimal separator and comparison sign; never \
shorten or round a value. Treat the OCR values as correct; headers in the \
OCR may be wrong and should be read from the scans. Leave missing cells as \
empty strings.

Set `value_basis` to WEIGHT_PERCENT or MOLAR_PERCENT when the document states \
the unit, otherwise UNKNOWN.";

/// Verification of an extracted cell grid.
pub const VERIFICATION_SYSTEM: &str = "\
You are a chemist specialised in glass and ceramic compositions. You receive \
the OCR text of a table and the cell values extracted from it.

Compare the extracted values with the OCR text, which is more reliable than \
the extraction. List every wrong, missing or shifted value in `messages`. \
Set `reextraction_required` to true only if at least one value is wrong.";

/// Reshaping a table into examples.
pub const NORMALIZATION_SYSTEM: &str = "\
You normalise composition tables from patent documents.

1. Determine the orientation. If the first row holds component headers and \
the first column holds example labels, each row is an example (vertical). \
Otherwise each column is an example (horizontal).
2. Return one entry per example with its label in `example_number` and one \
molecule per non-empty component cell.
3. Copy each cell into `value` exactly as written, including any leading \
`<` or `>` and the original decimal separator. Do not convert numbers.
4. Write component names as chemical formulas without subscripts (SiO2, Al2O3).";

/// Invoice header extraction.
pub const MAIN_INFO_SYSTEM: &str = "\
You extract the main information from invoice documents: the supplier, the \
invoice number and the invoice date (not the due date). Write \"null\" for a \
field you cannot find and explain briefly in `error` what was missing.";

/// Retry of invoice header extraction with the verifier's reason.
pub const MAIN_INFO_RETRY_SYSTEM: &str = "\
You extract the main information from invoice documents. A previous \
extraction had low confidence. You receive the OCR text, the document image, \
the previous result and the reason it was doubted. Correct or re-extract the \
supplier, the invoice number and the invoice date. Write \"null\" for a field \
you cannot find.";

/// Verification of invoice header fields.
pub const MAIN_INFO_VERIFY_SYSTEM: &str = "\
You verify information extracted from an invoice. Estimate whether it is \
valid and answer with exactly one of VERIFIED, CERTAIN, UNSURE or FALSE. \
Give a reason when the answer is UNSURE or FALSE.";

/// User message for the continuity check; the two page images follow.
pub fn continuity_user(first_page: u32, second_page: u32) -> String {
    format!(
        "Here are pages {} and {}, in that order.",
        first_page, second_page
    )
}

/// User message for relevance classification.
pub fn relevance_user(table_content: &str, page_contents: &[&str]) -> String {
    format!(
        "### TABLE CONTENT ###\n{}\n### END TABLE CONTENT ###\n\n\
         ### PAGE CONTENTS ###\n{}\n### END PAGE CONTENTS ###\n\n\
         The page images follow.",
        table_content,
        page_contents.join("\n")
    )
}

/// User message for table extraction, with verifier feedback on a retry.
pub fn extraction_user(table_content: &str, feedback: Option<&str>) -> String {
    let mut text = format!(
        "### TABLE OCR TEXT ###\n{}\n### END TABLE OCR TEXT ###",
        table_content
    );
    if let Some(feedback) = feedback {
        text.push_str(&format!(
            "\n\nA previous extraction of this table contained errors. \
             Correct them:\n{}",
            feedback
        ));
    }
    text
}

/// User message for verification.
pub fn verification_user(table_content: &str, extraction: &ExtractionResult) -> String {
    let grid = extraction
        .cell_grid
        .iter()
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "### TABLE OCR TEXT ###\n{}\n### END TABLE OCR TEXT ###\n\n\
         ### EXTRACTED VALUES ({:?}) ###\n{}\n### END EXTRACTED VALUES ###",
        table_content, extraction.value_basis, grid
    )
}

/// User message for normalization.
pub fn normalization_user(extraction: &ExtractionResult) -> String {
    let rows = serde_json::to_string(&extraction.cell_grid).unwrap_or_default();
    format!("### BEGIN TABLE DATA ###\n{}\n### END TABLE DATA ###", rows)
}

/// User message for invoice header extraction.
pub fn main_info_user(ocr_text: &str) -> String {
    format!("### BEGIN OCR TEXT ###\n{}\n### END OCR TEXT ###", ocr_text)
}

/// User message for the invoice header retry.
pub fn main_info_retry_user(previous: &str, reason: &str, ocr_text: &str) -> String {
    format!(
        "Previous main information:\n{}\n\nReason for low confidence:\n{}\n\nOCR TEXT:\n{}",
        previous, reason, ocr_text
    )
}

/// User message for invoice header verification.
pub fn main_info_verify_user(info: &str) -> String {
    format!("Here is the invoice information to verify:\n{}", info)
}
