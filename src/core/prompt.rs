use chrono::NaiveDateTime;

/// Keys the model is asked to fill, in prompt order.
pub const TICKET_KEYS: [&str; 9] = [
    "origin",
    "destination",
    "journey_date",
    "journey_time",
    "travel_class",
    "passenger_count",
    "ticket_type",
    "is_valid_now",
    "validity_reason",
];

pub fn build_prompt(ocr_text: &str, now: NaiveDateTime) -> String {
    format!(
        "Extract the following fields from the OCR text of a Mumbai local train ticket. \
         Return ONLY a single JSON object with these keys (use null when unknown): \
         origin, destination, journey_date (YYYY-MM-DD), journey_time (HH:MM), \
         travel_class, passenger_count (integer), ticket_type, is_valid_now (boolean), \
         validity_reason (short string). \
         Use the current time {now} to decide validity. Keep validity_reason short.\n\n\
         OCR: {ocr_text}\nJSON:",
        now = now.format("%Y-%m-%d %H:%M:%S"),
    )
}
