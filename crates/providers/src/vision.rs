//! Image description through a vision-capable chat model.

use {
    anyhow::Result,
    base64::{Engine, engine::general_purpose::STANDARD},
    murmur_media::image_ops::prepare_for_vision,
    tracing::{debug, warn},
};

use crate::openai_compat::{ChatMessage, ChatRequest, ContentPart, ImageUrl, OpenAiClient};

const DESCRIBE_PROMPT: &str = "Describe this image. What do you see? Give a detailed description \
                               of the content, colours, objects, any text, and the overall meaning.";

/// Describes images with a vision model, downscaling oversized input first.
#[derive(Debug, Clone)]
pub struct ImageDescriber {
    client: OpenAiClient,
    model: String,
    max_dimension: u32,
}

impl ImageDescriber {
    pub fn new(client: OpenAiClient, model: impl Into<String>, max_dimension: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_dimension,
        }
    }

    pub async fn describe(&self, data: &[u8], mime: &str) -> Result<String> {
        let (bytes, media_type) = match prepare_for_vision(data, self.max_dimension) {
            Ok(prepared) => {
                if prepared.resized {
                    debug!(
                        width = prepared.width,
                        height = prepared.height,
                        "image downscaled for vision"
                    );
                }
                (prepared.data, prepared.media_type.to_string())
            },
            Err(e) => {
                warn!(error = %e, "image preparation failed, sending original bytes");
                let mime = mime.split(';').next().unwrap_or(mime).trim();
                let mime = if mime.starts_with("image/") {
                    mime
                } else {
                    "image/jpeg"
                };
                (data.to_vec(), mime.to_string())
            },
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: DESCRIBE_PROMPT.into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{media_type};base64,{}", STANDARD.encode(&bytes)),
                    },
                },
            ])],
            temperature: Some(0.7),
            max_tokens: Some(500),
        };

        let description = self.client.chat(&request).await?;
        if description.is_empty() {
            anyhow::bail!("empty image description");
        }
        Ok(description)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher, secrecy::Secret, std::io::Cursor};

    fn client(url: &str) -> OpenAiClient {
        OpenAiClient::new(
            reqwest::Client::new(),
            url,
            Some(Secret::new("sk-test".into())),
        )
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn sends_data_url_to_vision_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""model":"gpt-4o""#.into()),
                Matcher::Regex(r#"data:image/png;base64,"#.into()),
            ]))
            .with_body(r#"{"choices":[{"message":{"content":"A black square."}}]}"#)
            .create_async()
            .await;

        let text = ImageDescriber::new(client(&server.url()), "gpt-4o", 1568)
            .describe(&tiny_png(), "image/png")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(text, "A black square.");
    }

    #[tokio::test]
    async fn undecodable_image_is_sent_as_is_and_empty_answer_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::Regex(r#"data:image/jpeg;base64,"#.into()))
            .with_body(r#"{"choices":[{"message":{"content":""}}]}"#)
            .create_async()
            .await;

        let err = ImageDescriber::new(client(&server.url()), "gpt-4o", 1568)
            .describe(b"not really an image", "application/octet-stream")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty image description"));
    }
}
