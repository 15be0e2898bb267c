//! Outbound copy and keyword vocabularies for the dialogue.

use crate::ports::RegistrationError;

/// Every text the dialogue can send, plus the words it reacts to.
///
/// `Default` carries the Italian copy used in production.
#[derive(Debug, Clone)]
pub struct DialogueMessages {
    pub welcome: String,
    pub confirmation_reprompt: String,
    pub name_request: String,
    pub invalid_name: String,
    pub email_request: String,
    pub invalid_email: String,
    pub registration_success: String,
    pub login_caption: String,
    pub login_warning: String,
    pub already_registered: String,
    pub help: String,
    pub farewell: String,
    pub technical_error: String,
    pub registration_invalid_request: String,
    pub registration_conflict: String,
    pub registration_declined: String,
    pub registration_unavailable: String,
    pub affirmative_tokens: Vec<String>,
    pub help_keywords: Vec<String>,
    pub restart_keywords: Vec<String>,
    pub exit_keywords: Vec<String>,
}

/// A reserved word that interrupts the dialogue in any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Help,
    Restart,
    Exit,
}

impl DialogueMessages {
    /// Matches the lower-cased, trimmed body against the keyword vocabularies.
    pub fn keyword(&self, body: &str) -> Option<Keyword> {
        let input = body.trim().to_lowercase();
        let matches = |words: &[String]| words.iter().any(|w| *w == input);
        if matches(&self.restart_keywords) {
            Some(Keyword::Restart)
        } else if matches(&self.exit_keywords) {
            Some(Keyword::Exit)
        } else if matches(&self.help_keywords) {
            Some(Keyword::Help)
        } else {
            None
        }
    }

    pub fn is_affirmative(&self, body: &str) -> bool {
        let input = body.trim().to_lowercase();
        self.affirmative_tokens.iter().any(|t| *t == input)
    }

    /// The user-facing text for a failed registration.
    pub fn registration_failure(&self, error: &RegistrationError) -> &str {
        match error {
            RegistrationError::InvalidRequest => &self.registration_invalid_request,
            RegistrationError::AlreadyRegistered => &self.registration_conflict,
            RegistrationError::Declined => &self.registration_declined,
            RegistrationError::Unavailable(_) => &self.registration_unavailable,
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for DialogueMessages {
    fn default() -> Self {
        Self {
            welcome: "Ciao 👋 Benvenuto nel servizio di trading con bot automatico. Alla registrazione ottieni 20€ di bonus e il bot si attiva subito. Vuoi registrarti ora? Rispondi \"Sì\".".into(),
            confirmation_reprompt: "Per favore rispondi \"Sì\" per continuare con la registrazione.".into(),
            name_request: "Perfetto. Inviami nome e cognome in un unico messaggio (es. \"Marco Rossi\").".into(),
            invalid_name: "Per favore inserisci un nome valido (almeno 2 caratteri).".into(),
            email_request: "Ora scrivi la tua email che userai per accedere (es. nome@dominio.com).".into(),
            invalid_email: "Per favore inserisci un indirizzo email valido (es. nome@dominio.com).".into(),
            registration_success: "Fatto ✅ Il tuo account è stato creato. Bonus 20€ attivo e bot operativo.".into(),
            login_caption: "🔗 Accedi al Trading Platform".into(),
            login_warning: "⚠️ Il link è valido per un solo accesso, non condividerlo.".into(),
            already_registered: "Il tuo account è già stato creato. Se hai bisogno di aiuto, scrivi \"supporto\".".into(),
            help: "Crea nuovo account o esci?\n\nRispondi:\n• \"nuovo\" - per creare un nuovo account\n• \"esci\" - per uscire".into(),
            farewell: "Grazie per aver utilizzato il nostro servizio! 👋".into(),
            technical_error: "Si è verificato un errore. Riprova.".into(),
            registration_invalid_request: "Invalid email format. Please provide a valid email address.".into(),
            registration_conflict: "An account with this email already exists. Please use a different email.".into(),
            registration_declined: "Registration failed. Please try again.".into(),
            registration_unavailable: "Registration service is temporarily unavailable. Please try again later.".into(),
            affirmative_tokens: words(&["sì", "si", "yes"]),
            help_keywords: words(&["help", "supporto", "aiuto"]),
            restart_keywords: words(&["restart", "nuovo"]),
            exit_keywords: words(&["exit", "esci"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_trimmed_and_case_insensitive() {
        let messages = DialogueMessages::default();
        assert_eq!(messages.keyword("  RESTART "), Some(Keyword::Restart));
        assert_eq!(messages.keyword("Esci"), Some(Keyword::Exit));
        assert_eq!(messages.keyword("supporto"), Some(Keyword::Help));
        assert_eq!(messages.keyword("help me"), None);
    }

    #[test]
    fn affirmative_accepts_localized_tokens() {
        let messages = DialogueMessages::default();
        assert!(messages.is_affirmative("Sì"));
        assert!(messages.is_affirmative(" si"));
        assert!(messages.is_affirmative("YES"));
        assert!(!messages.is_affirmative("no"));
        assert!(!messages.is_affirmative("sisi"));
    }

    #[test]
    fn each_registration_failure_has_its_own_text() {
        let messages = DialogueMessages::default();
        let texts = [
            messages.registration_failure(&RegistrationError::InvalidRequest),
            messages.registration_failure(&RegistrationError::AlreadyRegistered),
            messages.registration_failure(&RegistrationError::Declined),
            messages.registration_failure(&RegistrationError::Unavailable("timeout".into())),
        ];
        for (i, a) in texts.iter().enumerate() {
            for b in &texts[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
