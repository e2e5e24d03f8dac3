use http_client::Request;

/// Media type asking Discogs for plain-text (unformatted) release fields
const API_FORMAT: &str = "application/vnd.discogs.v2.plaintext+json";

/// Add the headers every Discogs API request carries
pub fn add_api_headers(request: &mut Request, user_agent: &str) {
    let _ = request.insert_header("Accept", API_FORMAT);
    let _ = request.insert_header("Accept-Encoding", "gzip");
    let _ = request.insert_header("Content-Type", "application/json");
    let _ = request.insert_header("User-Agent", user_agent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_types::{Method, Url};

    #[test]
    fn test_api_headers() {
        let url = Url::parse("https://api.discogs.com/oauth/identity").unwrap();
        let mut request = Request::new(Method::Get, url);
        add_api_headers(&mut request, "discogs2music/test");

        let header = |name: &str| request.header(name).unwrap().last().as_str().to_string();
        assert_eq!(header("Accept"), API_FORMAT);
        assert_eq!(header("User-Agent"), "discogs2music/test");
        assert_eq!(header("Content-Type"), "application/json");
    }
}
