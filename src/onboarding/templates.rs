//! Localized reply templates, one table keyed by language and prompt kind.
//!
//! Every locale offers the identical step sequence; adding a language means
//! filling one column of this table, not copying a flow.

use crate::users::Language;

/// Every templated message the bot can send on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Shown until a valid language token arrives. Multilingual by design.
    LanguageSelect,
    AskName,
    AskCountry,
    AskLanguages,
    AskGoal,
    RegistrationComplete,
    AwaitingReview,
    Rejected,
    Suspended,
    /// Out-of-band message sent when an admin approves the sender.
    ApprovedNotice,
    /// The only thing a sender sees when the dispatcher is exhausted.
    TechnicalDifficulty,
}

impl PromptKind {
    pub const ALL: [PromptKind; 11] = [
        Self::LanguageSelect,
        Self::AskName,
        Self::AskCountry,
        Self::AskLanguages,
        Self::AskGoal,
        Self::RegistrationComplete,
        Self::AwaitingReview,
        Self::Rejected,
        Self::Suspended,
        Self::ApprovedNotice,
        Self::TechnicalDifficulty,
    ];
}

/// The language-selection menu precedes any language choice, so it speaks all
/// supported languages at once.
const LANGUAGE_MENU: &str = "\
Willkommen beim Deutschlehrer-Bot! / Welcome to the German tutor bot!

Please choose your language / Bitte wählen Sie Ihre Sprache:
1 — English
2 — Deutsch
3 — Français
4 — العربية

Reply with a number or a language name (e.g. \"EN\").";

/// Look up the template for a language and prompt kind.
pub fn prompt(lang: Language, kind: PromptKind) -> &'static str {
    use Language::*;
    use PromptKind::*;
    match (lang, kind) {
        (_, LanguageSelect) => LANGUAGE_MENU,

        (English, AskName) => "Great! Let's get you registered.\n\nWhat is your full name?",
        (German, AskName) => "Super! Beginnen wir mit der Anmeldung.\n\nWie ist Ihr vollständiger Name?",
        (French, AskName) => "Parfait ! Commençons votre inscription.\n\nQuel est votre nom complet ?",
        (Arabic, AskName) => "رائع! لنبدأ التسجيل.\n\nما هو اسمك الكامل؟",

        (English, AskCountry) => "Thanks! Which country are you from?",
        (German, AskCountry) => "Danke! Aus welchem Land kommen Sie?",
        (French, AskCountry) => "Merci ! De quel pays venez-vous ?",
        (Arabic, AskCountry) => "شكرا! من أي بلد أنت؟",

        (English, AskLanguages) => {
            "Which languages do you speak? (e.g. \"Arabic and French\")"
        }
        (German, AskLanguages) => {
            "Welche Sprachen sprechen Sie? (z.B. \"Arabisch und Französisch\")"
        }
        (French, AskLanguages) => {
            "Quelles langues parlez-vous ? (p.ex. « arabe et français »)"
        }
        (Arabic, AskLanguages) => "ما هي اللغات التي تتحدثها؟ (مثلاً: العربية والفرنسية)",

        (English, AskGoal) => {
            "What is your German learning goal? For example: pass the A1 exam, \
             B1 for work, everyday conversations, or the DTZ."
        }
        (German, AskGoal) => {
            "Was ist Ihr Deutschlern-Ziel? Zum Beispiel: A1-Prüfung bestehen, \
             B1 für die Arbeit, Alltagsgespräche oder der DTZ."
        }
        (French, AskGoal) => {
            "Quel est votre objectif d'apprentissage ? Par exemple : réussir \
             l'examen A1, le B1 pour le travail, les conversations quotidiennes, ou le DTZ."
        }
        (Arabic, AskGoal) => {
            "ما هو هدفك من تعلم الألمانية؟ مثلاً: اجتياز امتحان A1، أو B1 للعمل، أو المحادثات اليومية."
        }

        (English, RegistrationComplete) => {
            "Registration complete! Your application is now with the \
             administrator for review. You will receive a message as soon as \
             you are approved — this can take up to 24 hours. Thank you!"
        }
        (German, RegistrationComplete) => {
            "Registrierung abgeschlossen! Ihre Anmeldung wird jetzt vom \
             Administrator geprüft. Sie erhalten eine Nachricht, sobald Sie \
             freigeschaltet sind — das kann bis zu 24 Stunden dauern. Vielen Dank!"
        }
        (French, RegistrationComplete) => {
            "Inscription terminée ! Votre demande est en cours d'examen par \
             l'administrateur. Vous recevrez un message dès votre validation — \
             cela peut prendre jusqu'à 24 heures. Merci !"
        }
        (Arabic, RegistrationComplete) => {
            "اكتمل التسجيل! طلبك الآن قيد المراجعة من قبل المشرف. ستصلك رسالة فور الموافقة — قد يستغرق ذلك حتى 24 ساعة. شكرا لك!"
        }

        (English, AwaitingReview) => {
            "Your application is still under review. Please be patient — you \
             will be notified as soon as you are approved."
        }
        (German, AwaitingReview) => {
            "Ihre Anmeldung wird noch geprüft. Bitte haben Sie etwas Geduld — \
             Sie werden benachrichtigt, sobald Sie freigeschaltet sind."
        }
        (French, AwaitingReview) => {
            "Votre demande est toujours en cours d'examen. Merci de patienter — \
             vous serez prévenu dès votre validation."
        }
        (Arabic, AwaitingReview) => {
            "ما زال طلبك قيد المراجعة. يرجى التحلي بالصبر — سيتم إشعارك فور الموافقة."
        }

        (English, Rejected) => {
            "Unfortunately your application was not approved. Please contact \
             the administrator for more information."
        }
        (German, Rejected) => {
            "Ihre Anmeldung wurde leider nicht genehmigt. Für weitere \
             Informationen wenden Sie sich bitte an den Administrator."
        }
        (French, Rejected) => {
            "Votre demande n'a malheureusement pas été acceptée. Veuillez \
             contacter l'administrateur pour plus d'informations."
        }
        (Arabic, Rejected) => {
            "للأسف لم تتم الموافقة على طلبك. يرجى التواصل مع المشرف لمزيد من المعلومات."
        }

        (English, Suspended) => {
            "Your access has been temporarily suspended. Please contact the \
             administrator."
        }
        (German, Suspended) => {
            "Ihr Zugang wurde vorübergehend gesperrt. Bitte kontaktieren Sie \
             den Administrator."
        }
        (French, Suspended) => {
            "Votre accès a été temporairement suspendu. Veuillez contacter \
             l'administrateur."
        }
        (Arabic, Suspended) => "تم تعليق وصولك مؤقتا. يرجى التواصل مع المشرف.",

        (English, ApprovedNotice) => {
            "Congratulations! Your application has been approved. You can \
             start learning German right away — just send me a message and I \
             will help you. Good luck!"
        }
        (German, ApprovedNotice) => {
            "Herzlichen Glückwunsch! Ihre Anmeldung wurde genehmigt. Sie \
             können sofort mit dem Deutschlernen beginnen — schreiben Sie mir \
             einfach eine Nachricht. Viel Erfolg!"
        }
        (French, ApprovedNotice) => {
            "Félicitations ! Votre demande a été acceptée. Vous pouvez \
             commencer à apprendre l'allemand dès maintenant — envoyez-moi \
             simplement un message. Bonne chance !"
        }
        (Arabic, ApprovedNotice) => {
            "تهانينا! تمت الموافقة على طلبك. يمكنك البدء بتعلم الألمانية فورا — فقط أرسل لي رسالة وسأساعدك. حظا موفقا!"
        }

        (English, TechnicalDifficulty) => {
            "Sorry, I'm having technical difficulties right now. Please try \
             again in a few minutes."
        }
        (German, TechnicalDifficulty) => {
            "Entschuldigung, ich habe gerade technische Probleme. Bitte \
             versuchen Sie es in ein paar Minuten erneut."
        }
        (French, TechnicalDifficulty) => {
            "Désolé, je rencontre des difficultés techniques en ce moment. \
             Veuillez réessayer dans quelques minutes."
        }
        (Arabic, TechnicalDifficulty) => {
            "عذرا، أواجه مشاكل تقنية حاليا. يرجى المحاولة مرة أخرى بعد بضع دقائق."
        }
    }
}
