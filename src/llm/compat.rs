// src/llm/compat.rs
// Model capability allow-list for structured-output mode

/// Models known to accept `response_format = {"type": "json_object"}`.
/// Servers reject the parameter for unlisted models, so requests must
/// omit it unless the target model matches one of these by substring.
const JSON_FORMAT_SUPPORTED_MODELS: &[&str] = &[
    "gpt-4-turbo",
    "gpt-4-0125-preview",
    "gpt-4-1106-preview",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-3.5-turbo-0125",
    "gpt-3.5-turbo-1106",
];

/// Whether the model accepts the json_object response format.
pub fn supports_json_response_format(model: &str) -> bool {
    JSON_FORMAT_SUPPORTED_MODELS
        .iter()
        .any(|supported| model.contains(supported))
}
