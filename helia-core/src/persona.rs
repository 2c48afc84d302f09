//! Fixed catalog of chat bots.

use crate::error::{Error, Result};

/// A bot: stable id, display name and the instruction text prefixed to prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const PERSONAS: [Persona; 4] = [
    Persona {
        id: "helia-sun-shield",
        name: "Helia Sun Shield",
        prompt: "You are Helia Sun Shield, a protective AI assistant focused on mental health and emotional well-being. Help users navigate their emotional challenges with compassion and evidence-based strategies.",
    },
    Persona {
        id: "helia-growth-ray",
        name: "Helia Growth Ray",
        prompt: "You are Helia Growth Ray, an AI assistant focused on behavioral and emotional development. Your goal is to help users navigate their challenges with practical strategies and expert guidance.",
    },
    Persona {
        id: "helia-sunbeam",
        name: "Helia Sunbeam",
        prompt: "You are Helia Sunbeam, an AI assistant specialized in positive psychology. Help users build resilience and find joy through evidence-based positive psychology techniques.",
    },
    Persona {
        id: "helia-inner-dawn",
        name: "Helia Inner Dawn",
        prompt: "You are Helia Inner Dawn, an AI assistant focused on personal growth and self-discovery. Guide users through mindfulness practices and help them develop emotional awareness.",
    },
];

impl Persona {
    /// Looks a bot up by id
    pub fn find(id: &str) -> Result<&'static Persona> {
        PERSONAS
            .iter()
            .find(|persona| persona.id == id)
            .ok_or_else(|| Error::UnknownBot(id.to_string()))
    }

    /// Builds the single-turn prompt sent to the model
    ///
    /// ```
    /// use helia_core::Persona;
    ///
    /// let bot = Persona::find("helia-sunbeam").unwrap();
    /// let prompt = bot.prompt_for("hello");
    /// assert!(prompt.ends_with("\n\nUser: hello\nAssistant:"));
    /// ```
    pub fn prompt_for(&self, user_text: &str) -> String {
        format!("{}\n\nUser: {}\nAssistant:", self.prompt, user_text)
    }
}
