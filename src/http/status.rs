//! HTTP status codes as a closed enum.

use std::fmt;

macro_rules! status_codes {
    (
        $(
            ($num:expr, $variant:ident, $phrase:expr);
        )+
    ) => {
        /// An HTTP status code.
        ///
        /// Covers the standard 1xx–5xx registry; numeric codes outside it map
        /// to [`StatusCode::Unknown`].
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            Unknown,
            $( $variant, )+
        }

        impl StatusCode {
            /// The numeric code; zero for [`StatusCode::Unknown`].
            pub fn as_u16(&self) -> u16 {
                match self {
                    StatusCode::Unknown => 0,
                    $( StatusCode::$variant => $num, )+
                }
            }

            /// Maps a wire code onto the enum; unlisted values yield
            /// [`StatusCode::Unknown`].
            pub fn from_u16(code: u16) -> StatusCode {
                match code {
                    $( $num => StatusCode::$variant, )+
                    _ => StatusCode::Unknown,
                }
            }

            /// The canonical reason phrase.
            pub fn reason(&self) -> &'static str {
                match self {
                    StatusCode::Unknown => "<unknown>",
                    $( StatusCode::$variant => $phrase, )+
                }
            }
        }
    };
}

status_codes! {
    (100, Continue, "Continue");
    (101, SwitchingProtocols, "Switching Protocols");
    (102, Processing, "Processing");
    (103, EarlyHints, "Early Hints");

    (200, Ok, "OK");
    (201, Created, "Created");
    (202, Accepted, "Accepted");
    (203, NonAuthoritativeInformation, "Non-Authoritative Information");
    (204, NoContent, "No Content");
    (205, ResetContent, "Reset Content");
    (206, PartialContent, "Partial Content");
    (207, MultiStatus, "Multi-Status");
    (208, AlreadyReported, "Already Reported");
    (226, ImUsed, "IM Used");

    (300, MultipleChoices, "Multiple Choices");
    (301, MovedPermanently, "Moved Permanently");
    (302, Found, "Found");
    (303, SeeOther, "See Other");
    (304, NotModified, "Not Modified");
    (305, UseProxy, "Use Proxy");
    (307, TemporaryRedirect, "Temporary Redirect");
    (308, PermanentRedirect, "Permanent Redirect");

    (400, BadRequest, "Bad Request");
    (401, Unauthorized, "Unauthorized");
    (402, PaymentRequired, "Payment Required");
    (403, Forbidden, "Forbidden");
    (404, NotFound, "Not Found");
    (405, MethodNotAllowed, "Method Not Allowed");
    (406, NotAcceptable, "Not Acceptable");
    (407, ProxyAuthenticationRequired, "Proxy Authentication Required");
    (408, RequestTimeout, "Request Timeout");
    (409, Conflict, "Conflict");
    (410, Gone, "Gone");
    (411, LengthRequired, "Length Required");
    (412, PreconditionFailed, "Precondition Failed");
    (413, PayloadTooLarge, "Payload Too Large");
    (414, UriTooLong, "URI Too Long");
    (415, UnsupportedMediaType, "Unsupported Media Type");
    (416, RangeNotSatisfiable, "Range Not Satisfiable");
    (417, ExpectationFailed, "Expectation Failed");
    (421, MisdirectedRequest, "Misdirected Request");
    (422, UnprocessableEntity, "Unprocessable Entity");
    (423, Locked, "Locked");
    (424, FailedDependency, "Failed Dependency");
    (425, TooEarly, "Too Early");
    (426, UpgradeRequired, "Upgrade Required");
    (428, PreconditionRequired, "Precondition Required");
    (429, TooManyRequests, "Too Many Requests");
    (431, RequestHeaderFieldsTooLarge, "Request Header Fields Too Large");
    (451, UnavailableForLegalReasons, "Unavailable For Legal Reasons");

    (500, InternalServerError, "Internal Server Error");
    (501, NotImplemented, "Not Implemented");
    (502, BadGateway, "Bad Gateway");
    (503, ServiceUnavailable, "Service Unavailable");
    (504, GatewayTimeout, "Gateway Timeout");
    (505, HttpVersionNotSupported, "HTTP Version Not Supported");
    (506, VariantAlsoNegotiates, "Variant Also Negotiates");
    (507, InsufficientStorage, "Insufficient Storage");
    (508, LoopDetected, "Loop Detected");
    (510, NotExtended, "Not Extended");
    (511, NetworkAuthenticationRequired, "Network Authentication Required");
}

impl StatusCode {
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.as_u16())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl Default for StatusCode {
    fn default() -> StatusCode {
        StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason())
    }
}
