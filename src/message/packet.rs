// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Packet`] type for bypass queries.

use std::fmt;
use std::sync::Arc;

use super::constants::*;
use super::reader::{self, Reader};
use crate::question::{Question, QuestionBuilder, MAX_KEYS};

/// A pre-built DNS query message carried through a bypass query
/// unmodified.
///
/// The question section is parsed when the `Packet` is made, so the
/// embedded question can be inspected at any time. The octets are
/// shared and never altered.
#[derive(Clone)]
pub struct Packet {
    octets: Arc<[u8]>,
    question: Question,
}

impl Packet {
    /// Wraps the message in `octets`. This fails if the message is not
    /// a standard query, declares more than [`MAX_KEYS`] questions, or
    /// its question section cannot be read.
    pub fn new(octets: impl Into<Arc<[u8]>>) -> Result<Self, reader::Error> {
        let octets = octets.into();
        let mut reader = Reader::try_from(&octets[..])?;
        if !reader.is_standard_query() {
            return Err(reader::Error::NotAQuery);
        } else if reader.qdcount() as usize > MAX_KEYS {
            return Err(reader::Error::TooManyQuestions);
        }
        let mut builder = QuestionBuilder::new();
        for _ in 0..reader.qdcount() {
            builder.add(reader.read_question()?);
        }
        Ok(Self {
            question: builder.build(),
            octets,
        })
    }

    /// Builds a recursive query message for `question` with a random
    /// ID. Names are written uncompressed. Questions of more than
    /// [`MAX_KEYS`] keys are refused.
    pub fn new_query(question: &Question) -> Result<Self, reader::Error> {
        let qdcount = u16::try_from(question.len())
            .ok()
            .filter(|&qdcount| qdcount as usize <= MAX_KEYS)
            .ok_or(reader::Error::TooManyQuestions)?;
        let mut octets = vec![0; HEADER_SIZE];
        octets[ID_START..ID_START + 2].copy_from_slice(&rand::random::<u16>().to_be_bytes());
        octets[RD_BYTE] |= RD_MASK;
        octets[QDCOUNT_START..QDCOUNT_START + 2].copy_from_slice(&qdcount.to_be_bytes());
        for key in question {
            octets.extend_from_slice(key.name().wire_repr());
            octets.extend_from_slice(&u16::from(key.rr_type()).to_be_bytes());
            octets.extend_from_slice(&u16::from(key.class()).to_be_bytes());
        }
        Ok(Self {
            octets: octets.into(),
            question: question.clone(),
        })
    }

    /// Returns the message ID.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.octets[ID_START], self.octets[ID_START + 1]])
    }

    /// Returns the question embedded in the message. It is empty if the
    /// message carries none.
    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn octets(&self) -> &[u8] {
        &self.octets
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id())
            .field("len", &self.octets.len())
            .field("question", &self.question)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::rr::{ResourceKey, Type};

    #[test]
    fn built_queries_parse_back() {
        let question = Question::from(ResourceKey::new(
            Class::IN,
            Type::AAAA,
            "www.example.com".parse().unwrap(),
        ));
        let packet = Packet::new_query(&question).unwrap();
        let parsed = Packet::new(packet.octets().to_vec()).unwrap();
        assert_eq!(parsed.id(), packet.id());
        assert_eq!(parsed.question(), &question);
    }

    #[test]
    fn oversized_questions_are_refused() {
        let oversized: Question = (0..=MAX_KEYS as u16)
            .map(|raw| ResourceKey::new(Class::IN, Type::from(raw), "example.com".parse().unwrap()))
            .collect();
        assert_eq!(oversized.len(), MAX_KEYS + 1);
        assert_eq!(
            Packet::new_query(&oversized).unwrap_err(),
            reader::Error::TooManyQuestions
        );

        // The declared count is checked before any question is read.
        let mut octets = vec![0; HEADER_SIZE];
        octets[QDCOUNT_START..QDCOUNT_START + 2].copy_from_slice(&u16::MAX.to_be_bytes());
        assert_eq!(Packet::new(octets).unwrap_err(), reader::Error::TooManyQuestions);
    }

    #[test]
    fn packets_without_question_are_accepted() {
        let packet = Packet::new(vec![0; HEADER_SIZE]).unwrap();
        assert!(packet.question().is_empty());
    }

    #[test]
    fn responses_are_rejected() {
        let mut octets = vec![0; HEADER_SIZE];
        octets[QR_BYTE] |= QR_MASK;
        assert_eq!(Packet::new(octets).unwrap_err(), reader::Error::NotAQuery);
        assert_eq!(
            Packet::new(vec![0; 4]).unwrap_err(),
            reader::Error::HeaderTooShort
        );
    }
}
