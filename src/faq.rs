//! Keyword-driven FAQ responder behind `/api/chat`.
//!
//! Stateless: each message is lowercased and checked against an ordered list
//! of keyword groups. The first group with a matching keyword answers.

/// One FAQ answer and the keywords that select it
#[derive(Debug, Clone, Copy)]
pub struct FaqEntry {
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
}

pub const DEFAULT_REPLY: &str = "Sorry, I didn't quite get that. Try asking about finding a \
service, booking, reviews, or registering as a provider.";

/// More specific phrases come before the single words they contain.
pub const FAQ_ENTRIES: &[FaqEntry] = &[
    FaqEntry {
        keywords: &["forgot password", "reset password"],
        reply: "Use 'Forgot Password' on the login page to reset your password.",
    },
    FaqEntry {
        keywords: &["delete account", "close account"],
        reply: "You can delete your account from your profile page. This also removes your \
bookings, reviews and bookmarks.",
    },
    FaqEntry {
        keywords: &["how to register", "register", "sign up", "become a provider"],
        reply: "Sign up and choose the provider role with a business name and description. \
Your services become visible once an admin approves them.",
    },
    FaqEntry {
        keywords: &["set up page", "promote", "freelancer"],
        reply: "Providers, including freelancers, can list services with a description, price, \
photo and location from the provider dashboard.",
    },
    FaqEntry {
        keywords: &["cancel"],
        reply: "Open the booking from 'My Bookings' and cancel it. Pending bookings can also \
be deleted entirely.",
    },
    FaqEntry {
        keywords: &["book", "reserve"],
        reply: "Pick an approved service, choose a future date and submit the booking. The \
provider then confirms it.",
    },
    FaqEntry {
        keywords: &["review", "rating"],
        reply: "After a booking you can leave one review with a rating from 1 to 5 for that \
service.",
    },
    FaqEntry {
        keywords: &["bookmark", "save"],
        reply: "Use the bookmark icon on a service to save it. Saved services appear under \
'Bookmarks'.",
    },
    FaqEntry {
        keywords: &["find", "search", "nearby", "recommend"],
        reply: "Browse services by category or search for what you need, for example 'home \
tutor' or 'plumber'.",
    },
    FaqEntry {
        keywords: &["login", "log in", "sign in"],
        reply: "Click 'Login' at the top right of the homepage.",
    },
    FaqEntry {
        keywords: &["hours", "open"],
        reply: "The platform is available 24/7. Support hours are 9am to 6pm, Monday to \
Friday.",
    },
    FaqEntry {
        keywords: &["contact", "support", "help"],
        reply: "Reach our support team through the Contact page.",
    },
    FaqEntry {
        keywords: &["location", "where"],
        reply: "We are based in Singapore and connect you with local providers across all \
neighbourhoods.",
    },
    FaqEntry {
        keywords: &["privacy", "safety", "safe"],
        reply: "Check provider profiles and ratings before booking. Our privacy policy is \
available on the website.",
    },
    FaqEntry {
        keywords: &["about", "what is"],
        reply: "We help customers discover nearby small businesses and freelancers such as \
tutors, cleaners and handymen.",
    },
];

/// Pick the reply for a chat message.
pub fn reply_for(message: &str) -> &'static str {
    let message = message.to_lowercase();
    FAQ_ENTRIES
        .iter()
        .find(|entry| entry.keywords.iter().any(|kw| message.contains(kw)))
        .map_or(DEFAULT_REPLY, |entry| entry.reply)
}
