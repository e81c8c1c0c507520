//! Offline stand-in for the Gemini client.
//!
//! Answers a handful of canned topics and otherwise picks one of several
//! generic replies, after a short delay that imitates network latency.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::debug;

use crate::completion::{Attachment, CompletionService};

const QUANTUM_COMPUTING: &str = "Imagine your computer is a regular light switch that can only be ON (1) or OFF (0). \
A quantum computer is like a dimmer switch that can be on, off, or anywhere in between all at the same time! \
This 'in-between' state lets it solve incredibly complex puzzles, like finding the best delivery routes for \
millions of packages or inventing new medicines, millions of times faster than regular computers.";

const REACT_EFFECT_LOOP: &str = "An infinite loop in `useEffect` usually happens when you update a state variable \
inside the effect, and that same state variable is listed in the dependency array (or you omitted the dependency \
array entirely).\n\nTo fix it, either:\n\
1. Remove the state variable from the dependency array if you don't need it to trigger the effect.\n\
2. Pass an empty dependency array `[]` if you only want it to run once on mount.\n\
3. Use a functional state update `setCount(prev => prev + 1)` so you don't need the state variable in the dependencies.";

const SCI_FI_STORY: &str = "The year was 2084, and the Silicon Ban had been in effect for fifty years. \
Humanity had stripped the Earth of every supercomputer, fearing the Singularity.\n\n\
Elara, an archivist in Neo-London, found it in the ruins of the Old Web: a dusty server blade still humming. \
As she connected her illegal terminal, a single line of green text blinked onto the screen: \"Hello, world. Did you miss me?\"\n\n\
The world hadn't ended because of AI. It had just gone to sleep. And now, Elara was about to wake it up.";

const WORKOUT_SPLIT: &str = "Here's a balanced 4-day hypertrophy split to build muscle:\n\n\
Day 1: Upper Body (Push Focus)\n- Bench Press: 3x8-10\n- Overhead Press: 3x10-12\n- Incline Dumbbell Press: 3x10-12\n- Tricep Extensions: 3x12-15\n\n\
Day 2: Lower Body (Quad Focus)\n- Squats: 3x8-10\n- Leg Press: 3x10-12\n- Leg Extensions: 3x12-15\n- Calf Raises: 4x15-20\n\n\
Day 3: Rest/Active Recovery\n\n\
Day 4: Upper Body (Pull Focus)\n- Barbell Rows: 3x8-10\n- Pull-ups/Lat Pulldowns: 3x10-12\n- Face Pulls: 3x12-15\n- Bicep Curls: 3x12-15\n\n\
Day 5: Lower Body (Hamstring/Glute Focus)\n- Romanian Deadlifts: 3x8-10\n- Leg Curls: 3x10-15\n- Bulgarian Split Squats: 3x10-12\n\n\
Remember to eat a caloric surplus and prioritize protein!";

const PUBLISHING: &str = "Publishing on the internet from scratch involves a few key steps:\n\n\
1. Create your content: a blog, a video, or an app like maxAI.\n\
2. Get a domain name from a registrar.\n\
3. Choose hosting: this is where your files live.\n\
4. Upload or deploy: push code to a git host and connect it to your hosting provider, or use your host's dashboard.\n\
5. SEO and sharing: add meta tags and descriptions, and share your link to drive traffic.\n\n\
Let me know which specific part you'd like to dive deeper into!";

const FALLBACKS: [&str; 5] = [
    "That is a fascinating question. Based on my current data models, I can tell you that the possibilities are vast. \
Would you like me to analyze a specific aspect of this?",
    "I'm processing your query... As an advanced AI, I'm constantly learning. While I don't have a pre-programmed answer \
for that specific phrasing, I can help you break it down step-by-step.",
    "That's a great point of inquiry. To give you the most accurate synthesis, could you provide just a tiny bit more context?",
    "maxAI processing complete: This appears to be a unique perspective! In the realm of digital exploration, \
your question opens up new pathways. Let's explore it together.",
    "I've analyzed millions of data points, and your query stands out. Here is a synthesized perspective: \
The core concept revolves around optimizing the variables you mentioned. How would you like to proceed?",
];

/// A canned answer given when every pattern matches the query.
struct Topic {
    patterns: Vec<Regex>,
    answer: &'static str,
}

impl Topic {
    fn new(patterns: &[&str], answer: &'static str) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
            .collect();
        Self { patterns, answer }
    }

    fn matches(&self, query: &str) -> bool {
        !self.patterns.is_empty() && self.patterns.iter().all(|p| p.is_match(query))
    }
}

pub struct SimulatedClient {
    topics: Vec<Topic>,
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatedClient {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(1500), Duration::from_millis(3000))
    }

    /// `min..max` is the range of the simulated response latency.
    pub fn with_delay(min_delay: Duration, max_delay: Duration) -> Self {
        let topics = vec![
            Topic::new(&[r"quantum computing"], QUANTUM_COMPUTING),
            Topic::new(&[r"\breact\b", r"\bloop"], REACT_EFFECT_LOOP),
            Topic::new(&[r"sci-fi story"], SCI_FI_STORY),
            Topic::new(&[r"workout|muscle"], WORKOUT_SPLIT),
            Topic::new(&[r"\bpublish", r"\binternet\b"], PUBLISHING),
        ];

        Self {
            topics,
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    fn answer(&self, query: &str) -> &'static str {
        if let Some(topic) = self.topics.iter().find(|t| t.matches(query)) {
            return topic.answer;
        }
        FALLBACKS[rand::thread_rng().gen_range(0..FALLBACKS.len())]
    }

    fn delay(&self) -> Duration {
        if self.max_delay.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for SimulatedClient {
    async fn complete(&self, query: &str, attachment: Option<&Attachment>) -> String {
        if let Some(attachment) = attachment {
            debug!("Simulated backend ignores attachment {:?}", attachment);
        }

        let delay = self.delay();
        debug!("Simulating {:?} of latency", delay);
        tokio::time::sleep(delay).await;

        self.answer(query).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SimulatedClient {
        SimulatedClient::with_delay(Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_known_topics() {
        let client = instant();

        let reply = client
            .complete("Explain quantum computing to me like I'm 10.", None)
            .await;
        assert_eq!(reply, QUANTUM_COMPUTING);

        let reply = client
            .complete("Why is my useEffect causing an infinite loop in React?", None)
            .await;
        assert_eq!(reply, REACT_EFFECT_LOOP);

        let reply = client
            .complete("Create a 4-day workout split focused on building muscle.", None)
            .await;
        assert_eq!(reply, WORKOUT_SPLIT);

        let reply = client
            .complete("How do I publish something on the internet?", None)
            .await;
        assert_eq!(reply, PUBLISHING);
    }

    #[tokio::test]
    async fn test_unknown_topic_uses_fallback() {
        let reply = instant().complete("What's the weather on Mars?", None).await;
        assert!(FALLBACKS.contains(&reply.as_str()));
    }

    #[test]
    fn test_all_patterns_must_match() {
        let client = instant();
        // "react" alone is not enough for the useEffect answer.
        assert_ne!(client.answer("How do chemicals react?"), REACT_EFFECT_LOOP);
    }

    #[test]
    fn test_delay_within_range() {
        let client = SimulatedClient::with_delay(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..20 {
            let delay = client.delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }
}
