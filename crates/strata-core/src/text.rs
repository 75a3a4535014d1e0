/// Sample inputs offered alongside the text transform, with their labels.
pub const SAMPLE_INPUTS: [(&str, &str); 3] = [
    ("The usual hello world.", "Hello, World!"),
    ("A test sentence.", "This is a test."),
    (
        "A longer sentence.",
        "This is a slightly longer sentence: how does the weather seem like today?",
    ),
];

/// The current text transformation: Unicode-aware uppercase.
#[must_use]
pub fn transform(text: &str) -> String {
    text.to_uppercase()
}
