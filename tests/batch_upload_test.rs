//! Batch Upload Tests
//!
//! Uploads in a batch are independent: results keep input order and one
//! failure never aborts the rest.

#[cfg(test)]
mod tests {
    use r2_uploadr::config::Config;
    use r2_uploadr::s3::Credentials;
    use r2_uploadr::upload::{upload_all, ErrorKind, UploadClient};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let server = MockServer::start().await;

        // The first source is slowest so completion order differs from input order.
        Mock::given(method("GET"))
            .and(path("/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .insert_header("content-type", "image/png")
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast.gif"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"fast".to_vec())
                    .insert_header("content-type", "image/gif"),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.storage.endpoint = Some(server.uri());
        config.relay.enabled = false;
        let client = UploadClient::new(&config).unwrap();
        let creds = Credentials::new("acct", "bucket", "access", "secret")
            .with_public_base_url("img.example.com");

        let sources = vec![
            format!("{}/slow.png", server.uri()),
            format!("{}/missing.png", server.uri()),
            format!("{}/fast.gif", server.uri()),
        ];
        let results = upload_all(&client, &sources, &creds, None, 3).await;

        assert_eq!(results.len(), 3);
        for ((source, _), expected) in results.iter().zip(&sources) {
            assert_eq!(source, expected);
        }

        let first = results[0].1.as_ref().unwrap();
        assert!(first.public_url.ends_with(".png"));
        assert_eq!(results[1].1.as_ref().unwrap_err().kind(), ErrorKind::Fetch);
        let third = results[2].1.as_ref().unwrap();
        assert!(third.public_url.ends_with(".gif"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mut config = Config::default();
        config.relay.enabled = false;
        let client = UploadClient::new(&config).unwrap();
        let creds = Credentials::default();
        let sources: Vec<String> = Vec::new();

        let results = upload_all(&client, &sources, &creds, None, 4).await;
        assert!(results.is_empty());
    }
}
