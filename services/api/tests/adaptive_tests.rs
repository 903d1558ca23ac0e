use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_current_question_starts_a_diagnostic_round() {
    let app = common::create_test_app();

    let (status, body) = common::get(&app, "/currentQuestion?user_id=ada").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["question_id"].is_i64());
    assert_eq!(body["difficulty"], "medium");

    // Asking again returns the same open question.
    let (_, again) = common::get(&app, "/currentQuestion?user_id=ada").await;
    assert_eq!(again["question_id"], body["question_id"]);
}

#[tokio::test]
async fn test_current_question_requires_user_id() {
    let app = common::create_test_app();

    let (status, body) = common::get(&app, "/currentQuestion").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_id is required");
}

#[tokio::test]
async fn test_answer_reports_classification_and_next_question() {
    let app = common::create_test_app();
    let (_, first) = common::get(&app, "/currentQuestion?user_id=ben").await;

    let (status, body) = common::post(
        &app,
        "/answer",
        json!({ "user_id": "ben", "question_id": first["question_id"], "user_answer": "right" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classification"], "correct");
    assert!(body["next_question"]["question_id"].is_i64());
    assert_ne!(body["next_question"]["question_id"], first["question_id"]);
}

#[tokio::test]
async fn test_answer_validates_fields() {
    let app = common::create_test_app();

    let (status, body) = common::post(&app, "/answer", json!({ "user_id": "cy" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_id, question_id, user_answer are required.");
}

#[tokio::test]
async fn test_answer_to_unknown_question_is_not_found() {
    let app = common::create_test_app();

    let (status, _) = common::post(
        &app,
        "/answer",
        json!({ "user_id": "dee", "question_id": 999_999, "user_answer": "right" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_answer_to_inactive_question_is_rejected() {
    let app = common::create_test_app();
    let (_, first) = common::get(&app, "/currentQuestion?user_id=eli").await;
    common::post(
        &app,
        "/answer",
        json!({ "user_id": "eli", "question_id": first["question_id"], "user_answer": "right" }),
    )
    .await;

    // The question is done after a correct answer.
    let (status, _) = common::post(
        &app,
        "/answer",
        json!({ "user_id": "eli", "question_id": first["question_id"], "user_answer": "right" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_finishing_round_one_moves_to_weak_topic_and_scores_leaderboard() {
    let app = common::create_test_app();
    let (_, mut current) = common::get(&app, "/currentQuestion?user_id=fay").await;

    let mut last = serde_json::Value::Null;
    for _ in 0..10 {
        let (status, body) = common::post(
            &app,
            "/answer",
            json!({ "user_id": "fay", "question_id": current["question_id"], "user_answer": "right" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        current = body["next_question"].clone();
        last = body;
    }

    // Every topic ends round one at 0.6, so the first topic in order is the weakest.
    assert_eq!(last["next_question"]["topic"], "Recursion");

    let (status, board) = common::get(&app, "/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board[0]["user_id"], "fay");
    assert_eq!(board[0]["total_score"], 100);
}
