//! Structured-output tools.
//!
//! These tools exist for their schemas: forcing the model to call one of them
//! yields arguments in exactly the declared shape. Executing them just echoes
//! the arguments back, so they are harmless if the model calls them in a
//! normal conversation.

use async_trait::async_trait;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolPayload};

pub struct SentimentScoresTool;

#[async_trait]
impl Tool for SentimentScoresTool {
    fn name(&self) -> &str {
        "print_sentiment_scores"
    }

    fn description(&self) -> &str {
        "Prints the sentiment scores of a given text."
    }

    fn input_schema(&self) -> serde_json::Value {
        let score = |what: &str| {
            serde_json::json!({
                "type": "number",
                "description": format!("The {what} sentiment score, ranging from 0.0 to 1.0."),
                "minimum": 0.0,
                "maximum": 1.0
            })
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "positive_score": score("positive"),
                "negative_score": score("negative"),
                "neutral_score": score("neutral")
            },
            "required": ["positive_score", "negative_score", "neutral_score"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        Ok(ToolPayload::Json(arguments))
    }
}

pub struct EntitiesTool;

#[async_trait]
impl Tool for EntitiesTool {
    fn name(&self) -> &str {
        "print_entities"
    }

    fn description(&self) -> &str {
        "Prints extracted named entities."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "The extracted entity name."},
                            "type": {"type": "string", "description": "The entity type (e.g., PERSON, ORGANIZATION, LOCATION)."},
                            "context": {"type": "string", "description": "The context in which the entity appears in the text."}
                        },
                        "required": ["name", "type", "context"]
                    }
                }
            },
            "required": ["entities"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        Ok(ToolPayload::Json(arguments))
    }
}

pub struct ArticleClassificationTool;

#[async_trait]
impl Tool for ArticleClassificationTool {
    fn name(&self) -> &str {
        "print_article_classification"
    }

    fn description(&self) -> &str {
        "Prints the classification results."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string", "description": "The overall subject of the article"},
                "summary": {"type": "string", "description": "A paragraph summary of the article"},
                "keywords": {
                    "type": "array",
                    "items": {"type": "string", "description": "List of keywords and topics in the article"}
                },
                "categories": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "The category name."},
                            "score": {
                                "type": "number",
                                "description": "The classification score for the category, ranging from 0.0 to 1.0.",
                                "minimum": 0.0,
                                "maximum": 1.0
                            }
                        },
                        "required": ["name", "score"]
                    }
                }
            },
            "required": ["subject", "summary", "keywords", "categories"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        Ok(ToolPayload::Json(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolwright_core::schema;

    #[test]
    fn schemas_compile() {
        assert!(schema::compile(&SentimentScoresTool.to_schema()).is_ok());
        assert!(schema::compile(&EntitiesTool.to_schema()).is_ok());
        assert!(schema::compile(&ArticleClassificationTool.to_schema()).is_ok());
    }

    #[test]
    fn article_classification_needs_scored_categories() {
        let validator = schema::compile(&ArticleClassificationTool.to_schema()).unwrap();
        let good = json!({
            "subject": "Jeff Goldblum",
            "summary": "An American actor known for his distinctive mannerisms.",
            "keywords": ["actor", "Jurassic Park", "jazz"],
            "categories": [
                {"name": "Entertainment", "score": 0.9},
                {"name": "Music", "score": 0.4}
            ]
        });
        assert!(schema::violations(&validator, &good).is_empty());

        let mut unscored = good.clone();
        unscored["categories"][1] = json!({"name": "Music"});
        let problems = schema::violations(&validator, &unscored);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("score"));

        let mut missing_summary = good;
        missing_summary.as_object_mut().unwrap().remove("summary");
        assert_eq!(schema::violations(&validator, &missing_summary).len(), 1);
    }

    #[test]
    fn sentiment_scores_are_bounded() {
        let validator = schema::compile(&SentimentScoresTool.to_schema()).unwrap();
        let good = json!({"positive_score": 0.0, "negative_score": 0.791, "neutral_score": 0.209});
        assert!(schema::violations(&validator, &good).is_empty());

        let out_of_range = json!({"positive_score": 1.5, "negative_score": 0.0, "neutral_score": 0.0});
        assert_eq!(schema::violations(&validator, &out_of_range).len(), 1);
    }

    #[test]
    fn entities_require_every_field() {
        let validator = schema::compile(&EntitiesTool.to_schema()).unwrap();
        let args = json!({"entities": [
            {"name": "John", "type": "PERSON", "context": "John works at Google"},
            {"name": "Google", "type": "ORGANIZATION"}
        ]});
        let problems = schema::violations(&validator, &args);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("context"));
    }

    #[tokio::test]
    async fn execute_echoes_arguments() {
        let args = json!({"entities": []});
        let payload = EntitiesTool.execute(args.clone()).await.unwrap();
        assert_eq!(payload, ToolPayload::Json(args));
    }
}
