// self
use session_relay::{
	_preludet::*,
	auth::CredentialPurpose,
	error::VerifyError,
	token::{TokenConfig, TokenIssuer, TokenKeys, TokenVerifier},
};

fn swap_signature(token: &str, donor: &str) -> String {
	let (unsigned, _) = token.rsplit_once('.').expect("Token should have a signature segment.");
	let (_, signature) = donor.rsplit_once('.').expect("Donor should have a signature segment.");

	format!("{unsigned}.{signature}")
}

#[test]
fn credentials_only_verify_for_their_own_purpose() {
	let (issuer, verifier) = test_token_pair();
	let issued =
		issuer.issue(&subject("user-1"), &role("manager")).expect("Issuing should succeed.");

	assert!(verifier.verify_access(Some(issued.access.expose())).is_ok());
	assert!(verifier.verify_renewal(Some(issued.renewal.expose())).is_ok());
	assert!(matches!(
		verifier.verify(Some(issued.renewal.expose()), CredentialPurpose::Access),
		Err(VerifyError::Invalid { .. })
	));
	assert!(matches!(
		verifier.verify(Some(issued.access.expose()), CredentialPurpose::Renewal),
		Err(VerifyError::Invalid { .. })
	));
}

#[test]
fn expired_genuine_credential_is_expired() {
	let (issuer, verifier) = test_token_pair();
	let issued_at = OffsetDateTime::now_utc() - Duration::hours(1);
	let issued = issuer
		.issue_at(&subject("user-2"), &role("viewer"), issued_at)
		.expect("Issuing in the past should succeed.");

	assert!(issued.access_claims.expires_at < OffsetDateTime::now_utc());
	assert_eq!(verifier.verify_access(Some(issued.access.expose())), Err(VerifyError::Expired));
	assert!(verifier.verify_renewal(Some(issued.renewal.expose())).is_ok());
}

#[test]
fn tampered_signature_is_invalid_even_with_future_expiry() {
	let (issuer, verifier) = test_token_pair();
	let issued =
		issuer.issue(&subject("user-3"), &role("viewer")).expect("Issuing should succeed.");
	let tampered = swap_signature(issued.access.expose(), issued.renewal.expose());

	assert!(matches!(verifier.verify_access(Some(&tampered)), Err(VerifyError::Invalid { .. })));
}

#[test]
fn tampered_expired_credential_is_invalid_not_expired() {
	let (issuer, verifier) = test_token_pair();
	let issued = issuer
		.issue_at(
			&subject("user-4"),
			&role("viewer"),
			OffsetDateTime::now_utc() - Duration::days(1),
		)
		.expect("Issuing in the past should succeed.");
	let tampered = swap_signature(issued.access.expose(), issued.renewal.expose());

	assert!(matches!(verifier.verify_access(Some(&tampered)), Err(VerifyError::Invalid { .. })));
}

#[test]
fn credentials_from_another_deployment_are_invalid() {
	let (_, verifier) = test_token_pair();
	let foreign = TokenIssuer::new(Arc::new(
		TokenKeys::from_config(&TokenConfig::new(
			"foreign-access-secret-0123456789abcdef",
			"foreign-renewal-secret-0123456789abcdef",
		))
		.expect("Foreign keys should be valid."),
	));
	let issued =
		foreign.issue(&subject("user-5"), &role("viewer")).expect("Issuing should succeed.");

	assert!(matches!(
		verifier.verify_access(Some(issued.access.expose())),
		Err(VerifyError::Invalid { .. })
	));
}

#[test]
fn leeway_accepts_recently_expired_credentials() {
	let keys = Arc::new(
		TokenKeys::from_config(&test_token_config().with_leeway_secs(120))
			.expect("Keys with leeway should be valid."),
	);
	let issuer = TokenIssuer::new(keys.clone());
	let verifier = TokenVerifier::new(keys);
	let issued_at =
		OffsetDateTime::now_utc() - TokenConfig::DEFAULT_ACCESS_TTL - Duration::seconds(30);
	let issued = issuer
		.issue_at(&subject("user-6"), &role("viewer"), issued_at)
		.expect("Issuing in the past should succeed.");

	assert!(verifier.verify_access(Some(issued.access.expose())).is_ok());
}
