use chatmate::redirect::RedirectCallback;
use chatmate::routes::callback_routes::{router, CallbackState};
use tokio::sync::mpsc;
use url::Url;

async fn spawn_listener() -> (String, mpsc::Receiver<Url>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel(4);
    let app = router(CallbackState::new(Url::parse(&base).unwrap(), tx));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, rx)
}

#[tokio::test]
async fn code_callback_is_forwarded_with_query() {
    let (base, mut rx) = spawn_listener().await;

    let resp = reqwest::get(format!("{base}/auth/google/callback?code=abc&state=xyz"))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(resp.text().await.unwrap().contains("Completing authentication"));

    let url = rx.recv().await.unwrap();
    assert_eq!(
        RedirectCallback::parse(&url),
        Some(RedirectCallback::AuthorizationCode { code: "abc".into(), state: "xyz".into() })
    );
}

#[tokio::test]
async fn success_callback_is_forwarded() {
    let (base, mut rx) = spawn_listener().await;

    reqwest::get(format!("{base}/auth/success?user_id=u1&name=A"))
        .await
        .unwrap();

    let url = rx.recv().await.unwrap();
    assert!(matches!(
        RedirectCallback::parse(&url),
        Some(RedirectCallback::DirectSuccess { .. })
    ));
}

#[tokio::test]
async fn legacy_callback_path_is_forwarded() {
    let (base, mut rx) = spawn_listener().await;

    let resp = reqwest::get(format!("{base}/auth/callback?code=abc&state=xyz"))
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let url = rx.recv().await.unwrap();
    assert_eq!(url.path(), "/auth/callback");
    assert!(matches!(
        RedirectCallback::parse(&url),
        Some(RedirectCallback::AuthorizationCode { .. })
    ));
}

#[tokio::test]
async fn other_paths_are_not_served() {
    let (base, mut rx) = spawn_listener().await;

    let resp = reqwest::get(format!("{base}/chat")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(rx.try_recv().is_err());
}
