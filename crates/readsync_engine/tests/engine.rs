use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use readsync_engine::{
    ApiCall, ApiClient, EngineEvent, EngineHandle, FailureKind, FetchError, MutationCall,
};
use serde_json::{json, Value};

struct ScriptedClient;

#[async_trait::async_trait]
impl ApiClient for ScriptedClient {
    async fn fetch_discussion(&self, item: &str) -> Result<Value, FetchError> {
        Ok(json!([{"id": 1, "book": item}]))
    }

    async fn send_mutation(&self, _call: &MutationCall) -> Result<Value, FetchError> {
        Err(FetchError {
            kind: FailureKind::Network,
            message: "connection reset".into(),
        })
    }

    async fn fetch_page(&self, _query: &str, page: u32, _size: u32) -> Result<Value, FetchError> {
        if page == 1 {
            // Answer the first page last.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(json!({"books": [], "page": page}))
    }

    async fn report_fact(&self, _subject: &str, _fact: &str) -> Result<Value, FetchError> {
        Ok(Value::Null)
    }
}

fn collect(engine: &EngineHandle, count: usize) -> BTreeMap<u64, Result<Value, FetchError>> {
    let mut done = BTreeMap::new();
    while done.len() < count {
        match engine.recv_timeout(Duration::from_secs(5)) {
            Some(EngineEvent::Completed { request_id, result }) => {
                done.insert(request_id, result);
            }
            None => panic!("engine went quiet after {} events", done.len()),
        }
    }
    done
}

#[test]
fn every_submission_completes_with_its_id() {
    let engine = EngineHandle::new(Arc::new(ScriptedClient));
    engine.submit(
        1,
        ApiCall::FetchDiscussion {
            item: "abc".into(),
        },
    );
    engine.submit(
        2,
        ApiCall::Mutation(MutationCall::Delete {
            review_id: "9".into(),
        }),
    );

    let done = collect(&engine, 2);
    assert_eq!(done[&1], Ok(json!([{"id": 1, "book": "abc"}])));
    assert_eq!(done[&2].as_ref().unwrap_err().kind, FailureKind::Network);
}

#[test]
fn completions_arrive_in_answer_order() {
    let engine = EngineHandle::new(Arc::new(ScriptedClient));
    for (id, page) in [(10, 1), (11, 2)] {
        engine.submit(
            id,
            ApiCall::FetchPage {
                query: "dune".into(),
                page,
                page_size: 10,
            },
        );
    }

    let first = engine.recv_timeout(Duration::from_secs(5));
    assert!(matches!(
        first,
        Some(EngineEvent::Completed { request_id: 11, .. })
    ));
    let second = engine.recv_timeout(Duration::from_secs(5));
    assert!(matches!(
        second,
        Some(EngineEvent::Completed { request_id: 10, .. })
    ));
}
