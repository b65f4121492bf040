mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use common::{FakeTranscriber, MemoryStore, Reply, response, transcription_job, worker};
use job_queue::{
    Dispatcher, JobStatus, ProgressStage, TranscriptionHandler, TranscriptionStatus, Worker,
    WorkerConfig, WorkerSummary,
};
use tokio_util::sync::CancellationToken;
use vox_elevenlabs::{TimestampsGranularity, Word, WordType};

fn three_words() -> Vec<Word> {
    vec![
        Word::word("Hello", 0.0, 0.4),
        Word::word(" ", 0.4, 0.5).with_kind(WordType::Spacing),
        Word::word("there", 0.5, 0.8),
        Word::word(" ", 0.8, 0.9).with_kind(WordType::Spacing),
        Word::word("friend", 0.9, 1.2),
    ]
}

fn payload(transcription_id: &str, file_id: &str) -> serde_json::Value {
    json!({
        "transcription_id": transcription_id,
        "file_id": file_id,
        "language": "en",
        "diarize": false,
    })
}

#[tokio::test]
async fn completes_transcription_job_end_to_end() {
    let store = MemoryStore::new();
    store.add_file("f1", "user/f1/meeting.mp3", b"ID3audio");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));

    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", three_words()))]);
    let report = worker(store.clone(), transcriber.clone())
        .run_batch(5)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert!(report.results[0].success);

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(job.error_message, None);
    assert_eq!(
        job.result.unwrap(),
        json!({
            "success": true,
            "transcriptionId": "t1",
            "fileId": "f1",
            "duration": 1.2,
            "wordCount": 3,
            "segmentCount": 1,
            "language": "en",
        })
    );

    let segments = store.segments("t1");
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "Hello there friend");
    assert_eq!(segments[0].start_time, 0.0);
    assert_eq!(segments[0].end_time, 1.2);
    assert_eq!(segments[0].sequence_number, 0);

    let transcription = store.transcription("t1");
    assert_eq!(transcription.status, Some(TranscriptionStatus::Completed));
    assert_eq!(transcription.language.as_deref(), Some("en"));
    assert_eq!(transcription.raw_text.as_deref(), Some("Hello there friend"));
    assert_eq!(transcription.progress_stage, None);
    assert_eq!(
        store.progress("t1"),
        [
            ProgressStage::Downloading,
            ProgressStage::Transcribing,
            ProgressStage::Finalizing
        ]
    );

    let calls = transcriber.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].audio, b"ID3audio");
    assert_eq!(calls[0].options.language.as_deref(), Some("en"));
    assert!(!calls[0].path.exists());
}

#[tokio::test]
async fn forwards_options_and_reports_diarizing_stage() {
    let store = MemoryStore::new();
    store.add_file("f1", "ignored.mp3", b"");
    store.add_file("other", "explicit/path.wav", b"RIFF");
    store.add_job(transcription_job(
        "j1",
        Utc::now(),
        json!({
            "transcription_id": "t1",
            "file_id": "f1",
            "file_path": "explicit/path.wav",
            "diarize": true,
            "num_speakers": 2,
            "timestamps_granularity": "character",
            "tag_audio_events": true,
        }),
    ));

    let words = vec![
        Word::word("hi", 0.0, 0.3).with_speaker("speaker_0"),
        Word::word("hello", 0.5, 0.9).with_speaker("speaker_1"),
    ];
    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", words))]);
    worker(store.clone(), transcriber.clone())
        .run_batch(1)
        .await
        .unwrap();

    let calls = transcriber.calls();
    assert_eq!(calls[0].audio, b"RIFF");
    assert_eq!(
        calls[0].path.extension().and_then(|e| e.to_str()),
        Some("wav")
    );
    assert!(calls[0].options.diarize);
    assert_eq!(calls[0].options.num_speakers, Some(2));
    assert_eq!(
        calls[0].options.timestamps_granularity,
        Some(TimestampsGranularity::Character)
    );
    assert!(calls[0].options.tag_audio_events);

    assert!(store.progress("t1").contains(&ProgressStage::Diarizing));

    let segments = store.segments("t1");
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].speaker_id, "speaker_0");
    assert_eq!(segments[1].speaker_id, "speaker_1");
    assert_eq!(segments[1].sequence_number, 1);
}

#[tokio::test]
async fn processes_oldest_jobs_first_within_limit() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    let now = Utc::now();
    store.add_job(transcription_job("newest", now, payload("t3", "f1")));
    store.add_job(transcription_job(
        "oldest",
        now - Duration::minutes(10),
        payload("t1", "f1"),
    ));
    store.add_job(transcription_job(
        "middle",
        now - Duration::minutes(5),
        payload("t2", "f1"),
    ));

    let transcriber = FakeTranscriber::with_replies([
        Reply::Ok(response("en", three_words())),
        Reply::Ok(response("en", three_words())),
    ]);
    let report = worker(store.clone(), transcriber)
        .run_batch(2)
        .await
        .unwrap();

    let ids: Vec<&str> = report.results.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(ids, ["oldest", "middle"]);
    assert_eq!(store.job("newest").status, JobStatus::Pending);
}

#[tokio::test]
async fn empty_transcript_is_not_an_error() {
    let store = MemoryStore::new();
    store.add_file("f1", "silence.wav", b"");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));

    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", vec![]))]);
    worker(store.clone(), transcriber).run_batch(1).await.unwrap();

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["wordCount"], 0);
    assert_eq!(result["segmentCount"], 0);
    assert_eq!(result["duration"], 0.0);
}

#[tokio::test]
async fn reprocessing_replaces_segments() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));
    store.add_job(transcription_job(
        "j2",
        Utc::now() + Duration::seconds(1),
        payload("t1", "f1"),
    ));

    let transcriber = FakeTranscriber::with_replies([
        Reply::Ok(response(
            "en",
            vec![Word::word("a", 0.0, 0.5), Word::word("b", 3.0, 3.5)],
        )),
        Reply::Ok(response("en", three_words())),
    ]);
    worker(store.clone(), transcriber).run_batch(2).await.unwrap();

    let segments = store.segments("t1");
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "Hello there friend");
}

#[tokio::test]
async fn transcription_failure_marks_job_and_transcription_failed() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));

    let transcriber =
        FakeTranscriber::with_replies([Reply::Err("api error 400: unsupported format".into())]);
    let report = worker(store.clone(), transcriber.clone())
        .run_batch(1)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert!(!report.results[0].success);

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed_at.is_some());
    let message = job.error_message.unwrap();
    assert!(message.contains("unsupported format"));
    assert_eq!(job.result.unwrap()["success"], false);

    let transcription = store.transcription("t1");
    assert_eq!(transcription.status, Some(TranscriptionStatus::Failed));
    assert_eq!(transcription.error_message.as_deref(), Some(message.as_str()));
    assert!(!transcriber.calls()[0].path.exists());
}

#[tokio::test]
async fn missing_file_record_fails_with_descriptive_error() {
    let store = MemoryStore::new();
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "nope")));

    let transcriber = FakeTranscriber::with_replies([]);
    worker(store.clone(), transcriber.clone())
        .run_batch(1)
        .await
        .unwrap();

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("file not found: nope"));
    assert!(transcriber.calls().is_empty());
}

#[tokio::test]
async fn invalid_payload_fails_without_touching_transcriptions() {
    let store = MemoryStore::new();
    store.add_job(transcription_job("j1", Utc::now(), json!({"file_id": "f1"})));

    worker(store.clone(), FakeTranscriber::with_replies([]))
        .run_batch(1)
        .await
        .unwrap();

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.error_message
            .unwrap()
            .starts_with("invalid job payload")
    );
    assert!(store.state.lock().unwrap().transcriptions.is_empty());
}

#[tokio::test]
async fn unknown_job_type_fails_without_handler() {
    let store = MemoryStore::new();
    let mut job = transcription_job("j1", Utc::now(), payload("t1", "f1"));
    job.job_type = "summarize".to_string();
    store.add_job(job);

    let transcriber = FakeTranscriber::with_replies([]);
    let report = worker(store.clone(), transcriber.clone())
        .run_batch(1)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("unknown job type: summarize")
    );
    assert!(transcriber.calls().is_empty());
    assert!(store.state.lock().unwrap().transcriptions.is_empty());
}

#[tokio::test]
async fn lost_claim_is_skipped_and_not_counted() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));
    store.add_job(transcription_job(
        "j2",
        Utc::now() + Duration::seconds(1),
        payload("t2", "f1"),
    ));
    store.state.lock().unwrap().lose_claims.insert("j1".to_string());

    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", three_words()))]);
    let report = worker(store.clone(), transcriber)
        .run_batch(5)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.results[0].job_id, "j2");
    assert_eq!(store.job("j1").status, JobStatus::Pending);
    assert_eq!(store.job("j1").attempts, 0);
}

#[tokio::test]
async fn panicking_handler_fails_job_and_batch_continues() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));
    store.add_job(transcription_job(
        "j2",
        Utc::now() + Duration::seconds(1),
        payload("t2", "f1"),
    ));

    let transcriber = FakeTranscriber::with_replies([
        Reply::Panic("decoder exploded"),
        Reply::Ok(response("en", three_words())),
    ]);
    let report = worker(store.clone(), transcriber)
        .run_batch(5)
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded(), 1);

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("handler panicked: decoder exploded")
    );
    assert_eq!(store.job("j2").status, JobStatus::Completed);
}

#[tokio::test]
async fn exhausted_job_is_failed_without_dispatch() {
    let store = MemoryStore::new();
    let mut job = transcription_job("j1", Utc::now(), payload("t1", "f1"));
    job.attempts = 3;
    store.add_job(job);

    let transcriber = FakeTranscriber::with_replies([]);
    let report = worker(store.clone(), transcriber.clone())
        .run_batch(1)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.completed_at.is_some());
    assert_eq!(
        job.error_message.as_deref(),
        Some("maximum attempts exceeded (3/3)")
    );
    assert!(transcriber.calls().is_empty());
}

#[tokio::test]
async fn finalize_failure_is_reported_as_partial_write() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));
    store.state.lock().unwrap().fail_finalize = true;

    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", three_words()))]);
    worker(store.clone(), transcriber).run_batch(1).await.unwrap();

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.error_message.unwrap();
    assert!(message.contains("segments for transcription t1 were written (1 rows)"));
    assert_eq!(store.segments("t1").len(), 1);
    assert_eq!(
        store.transcription("t1").status,
        Some(TranscriptionStatus::Failed)
    );
}

#[tokio::test]
async fn segment_insert_failure_fails_job() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    store.add_job(transcription_job("j1", Utc::now(), payload("t1", "f1")));
    store.state.lock().unwrap().fail_segment_insert = true;

    let transcriber = FakeTranscriber::with_replies([Reply::Ok(response("en", three_words()))]);
    worker(store.clone(), transcriber).run_batch(1).await.unwrap();

    let job = store.job("j1");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("failed to insert segments: segment insert rejected")
    );
}

#[tokio::test]
async fn every_claimed_job_ends_terminal() {
    let store = MemoryStore::new();
    store.add_file("f1", "a.mp3", b"a");
    let now = Utc::now();
    for i in 0..4 {
        store.add_job(transcription_job(
            &format!("j{i}"),
            now + Duration::seconds(i),
            payload(&format!("t{i}"), "f1"),
        ));
    }

    let transcriber = FakeTranscriber::with_replies([
        Reply::Ok(response("en", three_words())),
        Reply::Err("boom".into()),
        Reply::Panic("oops"),
        Reply::Ok(response("en", vec![])),
    ]);
    worker(store.clone(), transcriber).run_batch(10).await.unwrap();

    for job in store.state.lock().unwrap().jobs.iter() {
        assert!(job.status.is_terminal(), "{} is {}", job.id, job.status);
        assert!(job.completed_at.is_some());
    }
}

#[tokio::test]
async fn continuous_mode_reports_totals_and_stops_on_cancel() {
    let store = MemoryStore::new();
    store.add_file("f1", "user/f1/meeting.mp3", b"ID3audio");
    let start = Utc::now() - Duration::minutes(10);
    for i in 0..20 {
        store.add_job(transcription_job(
            &format!("j{i}"),
            start + Duration::seconds(i),
            payload(&format!("t{i}"), "f1"),
        ));
    }

    let transcriber = FakeTranscriber::with_replies(
        (0..19)
            .map(|_| Reply::Ok(response("en", three_words())))
            .chain([Reply::Err("upstream rejected audio".to_string())]),
    );
    let worker = Worker::new(
        store.clone(),
        Dispatcher::new(TranscriptionHandler::new(store.clone(), transcriber)),
        WorkerConfig {
            max_jobs: 3,
            poll_interval: std::time::Duration::from_millis(10),
            reclaim_after_minutes: Some(30),
        },
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run_continuous(cancel).await }
    });

    for _ in 0..500 {
        let done = store
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .all(|j| j.status.is_terminal());
        if done {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let summary = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        summary,
        WorkerSummary {
            processed: 20,
            succeeded: 19,
            failed: 1,
        }
    );
    assert_eq!(store.job("j19").status, JobStatus::Failed);
}
