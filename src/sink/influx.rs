use crate::sink::batch::Batch;
use crate::sink::descriptor::SinkDescriptor;
use crate::sink::line_protocol::encode_batch;
use crate::sink::traits::{Sink, SinkError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the InfluxDB 1.x `/write` endpoint.
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: String,
    username: String,
    password: String,
}

impl InfluxSink {
    pub fn new(descriptor: &SinkDescriptor, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            write_url: format!("{}/write", descriptor.endpoint),
            username: descriptor.username.clone(),
            password: descriptor.password.clone(),
        })
    }
}

#[async_trait]
impl Sink for InfluxSink {
    async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        let body = encode_batch(batch)?;

        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[("db", batch.namespace.as_str()), ("precision", batch.precision.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);

        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!(points = batch.len(), db = %batch.namespace, "Wrote batch to InfluxDB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Record;
    use crate::sink::batch::BatchSettings;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn batch() -> Batch {
        let record = Record {
            timestamp: Utc.with_ymd_and_hms(2018, 3, 4, 5, 49, 52).unwrap(),
            method: "GET".to_string(),
            path: "/foo".to_string(),
            scheme: "http".to_string(),
            status: "200".to_string(),
            bytes_sent: 2133,
            upstream_time: 1.005,
            request_time: 1.854,
        };
        let descriptor = SinkDescriptor::parse("http://unused@admin@123456@my_test@s").unwrap();
        Batch::from_records(&BatchSettings::new("nginx_log", &descriptor), &[record])
    }

    fn sink_for(server: &mockito::Server, credentials: &str) -> InfluxSink {
        let dsn = format!("{}@{}@my_test@s", server.url(), credentials);
        let descriptor = SinkDescriptor::parse(&dsn).unwrap();
        InfluxSink::new(&descriptor, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_write_posts_line_protocol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "my_test".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            // admin:123456
            .match_header("authorization", "Basic YWRtaW46MTIzNDU2")
            .match_body(
                "nginx_log,Method=GET,Path=/foo,Scheme=http,Status=200 \
                 ByteSent=2133i,RequestTime=1.854,UpstreamTime=1.005 1520142592\n",
            )
            .with_status(204)
            .create_async()
            .await;

        let sink = sink_for(&server, "admin@123456");
        sink.write(&batch()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_auth_header_without_username() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/write")
            .match_query(Matcher::Any)
            .match_header("authorization", Matcher::Missing)
            .with_status(204)
            .create_async()
            .await;

        let sink = sink_for(&server, "@");
        sink.write(&batch()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/write")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"database not found: \"my_test\""}"#)
            .create_async()
            .await;

        let sink = sink_for(&server, "admin@123456");
        let err = sink.write(&batch()).await.unwrap_err();

        match err {
            SinkError::Rejected { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("database not found"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let descriptor = SinkDescriptor::parse("http://127.0.0.1:1@admin@pw@my_test@s").unwrap();
        let sink = InfluxSink::new(&descriptor, Duration::from_secs(2)).unwrap();

        let err = sink.write(&batch()).await.unwrap_err();

        assert!(matches!(err, SinkError::Http(_)));
        assert!(err.is_retryable());
    }
}
