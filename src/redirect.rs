use url::Url;

use crate::config::{CODE_CALLBACK_PATH, LEGACY_CODE_CALLBACK_PATH, SUCCESS_CALLBACK_PATH};
use crate::errors::AppError;
use crate::models::{UserId, UserProfile};

/// What a page load's URL says about an OAuth round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectCallback {
    /// Authorization-code callback, to be exchanged with the backend.
    AuthorizationCode { code: String, state: String },
    /// The backend already validated the login and hands over the identity.
    DirectSuccess { user_id: UserId, profile: UserProfile },
    /// The provider reported an error, or the callback was malformed.
    Failed { message: String },
}

impl RedirectCallback {
    /// Parses a callback from `url`. Returns `None` for ordinary page loads.
    ///
    /// An `error` parameter wins over everything else; a code/state pair wins
    /// over a bare user identifier.
    pub fn parse(url: &Url) -> Option<Self> {
        if !is_callback_path(url.path()) {
            return None;
        }

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(error) = param("error") {
            let message = match param("error_description") {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Some(Self::Failed { message });
        }

        let (code, state) = (param("code"), param("state"));
        if let (Some(code), Some(state)) = (&code, &state) {
            return Some(Self::AuthorizationCode { code: code.clone(), state: state.clone() });
        }

        // Half of a code/state pair is not a pair; a user identifier still counts.
        if let Some(user_id) = param("user_id") {
            return Some(Self::DirectSuccess {
                user_id: UserId::new(user_id),
                profile: UserProfile { email: param("email"), name: param("name") },
            });
        }

        let missing = match (code, state) {
            (Some(_), None) => Some("state"),
            (None, Some(_)) => Some("code"),
            _ => None,
        };
        let message = match missing {
            Some(name) => AppError::MissingCallbackParameter { name: name.to_string() }.to_string(),
            None => "No authorization parameters found".to_string(),
        };
        Some(Self::Failed { message })
    }
}

fn is_callback_path(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    [CODE_CALLBACK_PATH, SUCCESS_CALLBACK_PATH, LEGACY_CODE_CALLBACK_PATH].contains(&path)
}

/// The application root for `url`: same origin, no path, query or fragment.
pub fn app_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Option<RedirectCallback> {
        RedirectCallback::parse(&Url::parse(s).unwrap())
    }

    #[test]
    fn plain_load_is_not_a_callback() {
        assert_eq!(parse("http://127.0.0.1:3000/"), None);
        assert_eq!(parse("http://127.0.0.1:3000/?code=abc&state=xyz"), None);
    }

    #[test]
    fn code_and_state_form() {
        assert_eq!(
            parse("http://127.0.0.1:3000/auth/google/callback?code=abc&state=xyz"),
            Some(RedirectCallback::AuthorizationCode { code: "abc".into(), state: "xyz".into() })
        );
        assert!(matches!(
            parse("http://127.0.0.1:3000/auth/callback?code=abc&state=xyz"),
            Some(RedirectCallback::AuthorizationCode { .. })
        ));
    }

    #[test]
    fn direct_success_form() {
        assert_eq!(
            parse("http://127.0.0.1:3000/auth/success?user_id=u1&email=e%40x.com"),
            Some(RedirectCallback::DirectSuccess {
                user_id: UserId::new("u1"),
                profile: UserProfile { email: Some("e@x.com".into()), name: None },
            })
        );
    }

    #[test]
    fn error_wins_over_authorization_parameters() {
        let parsed = parse(
            "http://127.0.0.1:3000/auth/google/callback?error=access_denied&code=abc&state=xyz",
        );
        assert_eq!(parsed, Some(RedirectCallback::Failed { message: "access_denied".into() }));

        let parsed = parse(
            "http://127.0.0.1:3000/auth/google/callback?error=access_denied&error_description=User+cancelled",
        );
        assert_eq!(
            parsed,
            Some(RedirectCallback::Failed { message: "access_denied: User cancelled".into() })
        );
    }

    #[test]
    fn code_state_wins_over_user_id() {
        assert!(matches!(
            parse("http://127.0.0.1:3000/auth/success?user_id=u1&code=abc&state=xyz"),
            Some(RedirectCallback::AuthorizationCode { .. })
        ));
    }

    #[test]
    fn half_pair_with_user_id_is_direct_success() {
        for url in [
            "http://127.0.0.1:3000/auth/success?user_id=u1&code=abc",
            "http://127.0.0.1:3000/auth/success?user_id=u1&state=xyz",
        ] {
            assert_eq!(
                parse(url),
                Some(RedirectCallback::DirectSuccess {
                    user_id: UserId::new("u1"),
                    profile: UserProfile::default(),
                }),
                "{url}"
            );
        }
    }

    #[test]
    fn half_pair_alone_names_the_missing_parameter() {
        assert_eq!(
            parse("http://127.0.0.1:3000/auth/google/callback?code=abc"),
            Some(RedirectCallback::Failed { message: "Missing callback parameter 'state'".into() })
        );
        assert_eq!(
            parse("http://127.0.0.1:3000/auth/google/callback?state=xyz"),
            Some(RedirectCallback::Failed { message: "Missing callback parameter 'code'".into() })
        );
    }

    #[test]
    fn incomplete_callbacks_fail() {
        assert!(matches!(
            parse("http://127.0.0.1:3000/auth/google/callback?code=abc"),
            Some(RedirectCallback::Failed { .. })
        ));
        assert!(matches!(
            parse("http://127.0.0.1:3000/auth/google/callback"),
            Some(RedirectCallback::Failed { .. })
        ));
        assert!(matches!(
            parse("http://127.0.0.1:3000/auth/success?user_id="),
            Some(RedirectCallback::Failed { .. })
        ));
    }

    #[test]
    fn app_root_drops_query() {
        let url = Url::parse("http://127.0.0.1:3000/auth/success?user_id=u1#top").unwrap();
        assert_eq!(app_root(&url).as_str(), "http://127.0.0.1:3000/");
    }
}
