#![cfg(all(feature = "axum", feature = "reqwest"))]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use reqwest::{Method, StatusCode, header::AUTHORIZATION};
use tokio::net::TcpListener;
// self
use session_relay::{
	_preludet::*,
	auth::{AuthFailure, SubjectProfile},
	client::{Session, SessionConfig},
	error::RenewalError,
	server::{self, AuthContext, AuthState, CookieConfig, MemoryDirectory, require_access},
};

const EMAIL: &str = "ops@farm.example";
const PASSWORD: &str = "correct horse";

async fn whoami(context: AuthContext) -> Json<serde_json::Value> {
	Json(serde_json::json!({ "subject": context.subject.as_ref() }))
}

async fn spawn_server() -> Url {
	let directory = MemoryDirectory::new();

	directory.insert(
		SubjectProfile {
			id: subject("user-1"),
			email: EMAIL.into(),
			name: "Ops".into(),
			role: role("manager"),
		},
		PASSWORD,
	);

	let cookies = CookieConfig { secure: false, ..CookieConfig::default() };
	let state = AuthState::from_config(&test_token_config(), Arc::new(directory), cookies)
		.expect("Auth state should build from test config.");
	let api = Router::new()
		.route("/api/whoami", get(whoami))
		.route_layer(from_fn_with_state(state.clone(), require_access));
	let app = server::router(state).merge(api);
	let listener =
		TcpListener::bind("127.0.0.1:0").await.expect("Loopback bind should succeed.");
	let addr = listener.local_addr().expect("Listener should have an address.");

	tokio::spawn(async move {
		axum::serve(listener, app).await.expect("Test server should run.");
	});

	Url::parse(&format!("http://{addr}")).expect("Server URL should parse.")
}

#[tokio::test]
async fn logout_ends_the_session_and_never_reuses_the_old_credential() {
	let base = spawn_server().await;
	let redirects = Arc::new(AtomicUsize::new(0));
	let counter = redirects.clone();
	let config = SessionConfig::builder(base.clone())
		.allow_insecure_http(true)
		.build()
		.expect("Session config should build.");
	let session = Session::with_client(config, test_reqwest_client()).with_login_redirect(
		Arc::new(move |_: &RenewalError| {
			counter.fetch_add(1, Ordering::SeqCst);
		}),
	);

	session.login(EMAIL, PASSWORD).await.expect("Login should succeed.");

	let response = session
		.send(session.request(Method::GET, "/api/whoami").expect("Path should resolve."))
		.await
		.expect("Authenticated request should succeed.");

	assert_eq!(response.status(), StatusCode::OK);

	let old = session.credentials().get().expect("Login should store a credential.");

	session
		.coordinator()
		.acquire(Some(&old))
		.await
		.expect("Renewal through the cookie jar should succeed.");

	assert_eq!(session.coordinator().metrics().successes(), 1);

	let old = session.credentials().get().expect("Renewal should store a credential.");

	session.logout().await.expect("Logout should succeed.");

	assert!(session.credentials().is_empty());

	let err = session
		.send(session.request(Method::GET, "/api/whoami").expect("Path should resolve."))
		.await
		.expect_err("Requests after logout should fail renewal.");

	assert!(matches!(
		err,
		Error::Renewal(ref cause) if matches!(
			**cause,
			RenewalError::Rejected { status: 401, failure: Some(AuthFailure::Missing) }
		)
	));
	assert!(session.credentials().is_empty());
	assert_eq!(redirects.load(Ordering::SeqCst), 1);

	// The server is stateless, so the old credential still verifies; the client simply never
	// sends it again.
	let direct = test_reqwest_client()
		.get(base.join("/api/whoami").expect("Path should resolve."))
		.header(AUTHORIZATION, format!("Bearer {}", old.expose()))
		.send()
		.await
		.expect("Direct request should reach the server.");

	assert_eq!(direct.status(), StatusCode::OK);
}
